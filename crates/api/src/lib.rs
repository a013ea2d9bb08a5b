//! Client for the review platform's private business API.
//!
//! - **Client** (`client`) - `ReviewApi` trait and the reqwest-backed `HttpReviewApi`
//! - **Token** (`token`) - password-grant access token with expiry tracking
//! - **Error** (`error`) - `ApiError` and its mapping into `ApplicationError`

pub mod client;
pub mod error;
pub mod token;

pub use client::{HttpReviewApi, ReviewApi};
pub use error::ApiError;
pub use token::AccessToken;
