use serde::{Deserialize, Serialize};

use reviewbot_core::{Review, StarRating};

pub const REPLY_ACTION: &str = "step_1_write_reply";
pub const OPEN_FEED_SETTINGS_ACTION: &str = "open_feed_settings";
pub const DELETE_FEED_SETTINGS_ACTION: &str = "delete_feed_settings";

pub const FILLED_STAR: char = '★';
pub const EMPTY_STAR: char = '✩';

const DEFAULT_CALLBACK_ID: &str = "default";
const DEFAULT_ATTACHMENT_TYPE: &str = "default";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Ephemeral,
    InChannel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirm {
    pub title: String,
    pub text: String,
    pub ok_text: String,
    pub dismiss_text: String,
}

impl Confirm {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            ok_text: "Yes".to_owned(),
            dismiss_text: "No".to_owned(),
        }
    }
}

/// Legacy attachment button. `name` mirrors `value` so handlers can match on either.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    pub text: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm: Option<Confirm>,
}

impl Action {
    pub fn button(value: impl Into<String>, text: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            name: value.clone(),
            text: text.into(),
            value,
            kind: "button".to_owned(),
            style: None,
            confirm: None,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn confirm(mut self, confirm: Confirm) -> Self {
        self.confirm = Some(confirm);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub title: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub callback_id: String,
    pub attachment_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
}

impl Default for Attachment {
    fn default() -> Self {
        Self {
            callback_id: DEFAULT_CALLBACK_ID.to_owned(),
            attachment_type: DEFAULT_ATTACHMENT_TYPE.to_owned(),
            author_name: None,
            title: None,
            text: None,
            color: None,
            footer: None,
            ts: None,
            fields: Vec::new(),
            actions: Vec::new(),
        }
    }
}

/// A chat message or a `response_url` reply. Absent fields are never serialized.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_type: Option<ResponseType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace_original: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), ..Self::default() }
    }

    pub fn ephemeral(mut self) -> Self {
        self.response_type = Some(ResponseType::Ephemeral);
        self
    }

    pub fn in_channel(mut self) -> Self {
        self.response_type = Some(ResponseType::InChannel);
        self
    }

    pub fn replacing_original(mut self) -> Self {
        self.replace_original = Some(true);
        self
    }

    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.attachments.iter().flat_map(|attachment| attachment.actions.iter())
    }
}

pub struct MessageBuilder {
    message: Message,
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self { message: Message::default() }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.message.text = Some(text.into());
        self
    }

    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.message.channel = Some(channel.into());
        self
    }

    pub fn thread_ts(mut self, thread_ts: impl Into<String>) -> Self {
        self.message.thread_ts = Some(thread_ts.into());
        self
    }

    pub fn attachment<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut AttachmentBuilder),
    {
        let mut builder = AttachmentBuilder::default();
        build(&mut builder);
        self.message.attachments.push(builder.build());
        self
    }

    pub fn build(self) -> Message {
        self.message
    }
}

#[derive(Default)]
pub struct AttachmentBuilder {
    attachment: Attachment,
}

impl AttachmentBuilder {
    pub fn callback_id(&mut self, callback_id: impl Into<String>) -> &mut Self {
        self.attachment.callback_id = callback_id.into();
        self
    }

    pub fn author_name(&mut self, author_name: impl Into<String>) -> &mut Self {
        self.attachment.author_name = Some(author_name.into());
        self
    }

    pub fn title(&mut self, title: impl Into<String>) -> &mut Self {
        self.attachment.title = Some(title.into());
        self
    }

    pub fn text(&mut self, text: impl Into<String>) -> &mut Self {
        self.attachment.text = Some(text.into());
        self
    }

    pub fn color(&mut self, color: impl Into<String>) -> &mut Self {
        self.attachment.color = Some(color.into());
        self
    }

    pub fn footer(&mut self, footer: impl Into<String>) -> &mut Self {
        self.attachment.footer = Some(footer.into());
        self
    }

    pub fn ts(&mut self, ts: i64) -> &mut Self {
        self.attachment.ts = Some(ts);
        self
    }

    pub fn field(&mut self, title: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.attachment.fields.push(Field { title: title.into(), value: value.into() });
        self
    }

    pub fn action(&mut self, action: Action) -> &mut Self {
        self.attachment.actions.push(action);
        self
    }

    fn build(self) -> Attachment {
        self.attachment
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self { label: label.into(), value: value.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DialogElement {
    Textarea {
        label: String,
        name: String,
    },
    Select {
        label: String,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        options: Vec<SelectOption>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialog {
    pub callback_id: String,
    pub title: String,
    pub submit_label: String,
    pub elements: Vec<DialogElement>,
}

impl Dialog {
    pub fn new(
        title: impl Into<String>,
        callback_id: impl Into<String>,
        submit_label: impl Into<String>,
    ) -> Self {
        Self {
            callback_id: callback_id.into(),
            title: title.into(),
            submit_label: submit_label.into(),
            elements: Vec::new(),
        }
    }

    pub fn textarea(mut self, label: impl Into<String>, name: impl Into<String>) -> Self {
        self.elements.push(DialogElement::Textarea { label: label.into(), name: name.into() });
        self
    }

    pub fn select(
        mut self,
        label: impl Into<String>,
        name: impl Into<String>,
        value: Option<String>,
        options: Vec<SelectOption>,
    ) -> Self {
        self.elements.push(DialogElement::Select {
            label: label.into(),
            name: name.into(),
            value,
            options,
        });
        self
    }
}

pub fn star_glyphs(rating: StarRating) -> String {
    let filled = usize::from(rating.value());
    let empty = usize::from(StarRating::MAX) - filled;
    std::iter::repeat(FILLED_STAR).take(filled).chain(std::iter::repeat(EMPTY_STAR).take(empty)).collect()
}

pub fn severity_color(rating: StarRating) -> &'static str {
    match rating.value() {
        4..=5 => "good",
        1..=2 => "danger",
        _ => "warning",
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ComposeOptions {
    pub can_reply: bool,
}

/// Review card with at most one reply button. Same inputs always give the same message.
pub fn compose_review_message(review: &Review, options: ComposeOptions) -> Message {
    let verified = if review.is_verified { "Verified" } else { "Not verified" };

    MessageBuilder::new()
        .attachment(|attachment| {
            attachment
                .author_name(review.consumer.display_name.as_str())
                .title(review.title.as_str())
                .text(review.text.as_str())
                .color(severity_color(review.stars))
                .footer(format!("{} {verified}", star_glyphs(review.stars)))
                .ts(review.created_at.timestamp());
            if let Some(reference_id) = &review.reference_id {
                attachment.field("Reference number", reference_id.as_str());
            }
            if options.can_reply {
                attachment
                    .callback_id(review.id.0.as_str())
                    .action(Action::button(REPLY_ACTION, ":writing_hand: Reply"));
            }
        })
        .build()
}

/// Channel settings entry point shown by the settings command and refreshed after changes.
pub fn settings_intro_message(has_settings: bool) -> Message {
    if has_settings {
        MessageBuilder::new()
            .attachment(|attachment| {
                attachment
                    .text("Manage your review settings for this channel.")
                    .action(
                        Action::button(DELETE_FEED_SETTINGS_ACTION, "Stop posting reviews")
                            .style(ButtonStyle::Danger)
                            .confirm(Confirm::new(
                                "Are you sure?",
                                "You will no longer see your reviews in this channel.",
                            )),
                    )
                    .action(Action::button(OPEN_FEED_SETTINGS_ACTION, "Change settings"));
            })
            .build()
    } else {
        MessageBuilder::new()
            .attachment(|attachment| {
                attachment
                    .text(
                        "Get your reviews posted on this channel. \
                         Click the button below to manage your review settings.",
                    )
                    .action(
                        Action::button(OPEN_FEED_SETTINGS_ACTION, "Post reviews here")
                            .style(ButtonStyle::Primary),
                    );
            })
            .build()
    }
}

/// Threaded confirmation posted under a review once a reply went through.
pub fn reply_confirmation_message(
    channel: &str,
    thread_ts: &str,
    author_name: &str,
    reply_text: &str,
    ts: Option<i64>,
) -> Message {
    MessageBuilder::new()
        .channel(channel)
        .thread_ts(thread_ts)
        .attachment(|attachment| {
            attachment.author_name(author_name).text(reply_text);
            if let Some(ts) = ts {
                attachment.ts(ts);
            }
        })
        .build()
}
