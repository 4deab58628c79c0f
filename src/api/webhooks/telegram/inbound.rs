//! Telegram message normalization into `InboundMessage`

use super::types::TelegramMessage;
use crate::channels::{InboundMessage, MediaRef, MessageKind, Platform, SharedContact};

/// Classify a message and pick its downloadable media
///
/// Photos use the largest size (last in the array).
pub(crate) fn classify(message: &TelegramMessage) -> (MessageKind, Option<MediaRef>) {
    let media = |id: &str, kind: MessageKind, mime: Option<&String>| MediaRef {
        id: id.to_string(),
        kind,
        declared_mime: mime.cloned(),
    };

    if let Some(largest) = message.photo.as_ref().and_then(|sizes| sizes.last()) {
        return (
            MessageKind::Photo,
            Some(media(&largest.file_id, MessageKind::Photo, None)),
        );
    }
    if let Some(voice) = &message.voice {
        return (
            MessageKind::Voice,
            Some(media(&voice.file_id, MessageKind::Voice, voice.mime_type.as_ref())),
        );
    }
    if let Some(audio) = &message.audio {
        return (
            MessageKind::Audio,
            Some(media(&audio.file_id, MessageKind::Audio, audio.mime_type.as_ref())),
        );
    }
    if message.contact.is_some() {
        return (MessageKind::Contact, None);
    }
    if message.text.is_some() {
        return (MessageKind::Text, None);
    }
    (MessageKind::Unsupported, None)
}

/// Build the platform-neutral message
pub(crate) fn to_inbound(message: &TelegramMessage) -> InboundMessage {
    let (kind, media) = classify(message);
    let chat_id = message.chat.id.to_string();

    let contact = message.contact.as_ref().map(|c| SharedContact {
        phone_number: c.phone_number.clone(),
        is_own: matches!((c.user_id, &message.from), (Some(owner), Some(from)) if owner == from.id),
    });

    InboundMessage {
        platform: Platform::Telegram,
        message_id: message.message_id.to_string(),
        sender_id: message
            .from
            .as_ref()
            .map_or_else(|| chat_id.clone(), |u| u.id.to_string()),
        sender_name: message.from.as_ref().map(super::types::TelegramUser::display_name),
        conversation_id: chat_id,
        kind,
        text: message.text.clone(),
        caption: message.caption.clone(),
        media,
        contact,
        verified_phone: None,
    }
}
