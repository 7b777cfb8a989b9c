//! Turn assembly: text and/or image into Messages API messages.

use super::errors::InferenceError;
use super::types::{ContentBlock, ImageData, Message, Role};

/// Build the message list for one turn.
///
/// The result is `prior` followed by at most one new user message. Text and
/// image share that message, text first. Empty text or an empty image counts
/// as absent; with neither present no message is built and
/// [`InferenceError::EmptyTurn`] is returned.
pub fn build_messages(
    prior: &[Message],
    input_text: Option<&str>,
    image: Option<&ImageData>,
) -> Result<Vec<Message>, InferenceError> {
    let text = input_text.filter(|t| !t.is_empty());
    let image = image.filter(|i| !i.is_empty());

    let mut content = Vec::with_capacity(2);
    if let Some(text) = text {
        content.push(ContentBlock::text(text));
    }
    if let Some(image) = image {
        content.push(ContentBlock::image(image));
    }
    if content.is_empty() {
        return Err(InferenceError::EmptyTurn);
    }

    let mut messages = Vec::with_capacity(prior.len() + 1);
    messages.extend_from_slice(prior);
    messages.push(Message {
        role: Role::User,
        content,
    });
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::types::{ImageSource, IMAGE_MEDIA_TYPE};

    fn image() -> ImageData {
        ImageData::from_base64("/9j/4AAQSkZJRg==")
    }

    #[test]
    fn test_text_only() {
        let messages = build_messages(&[], Some("Hello"), None).unwrap();
        assert_eq!(messages, vec![Message::user_text("Hello")]);
    }

    #[test]
    fn test_image_only() {
        let messages = build_messages(&[], None, Some(&image())).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content.len(), 1);
        match &messages[0].content[0] {
            ContentBlock::Image {
                source: ImageSource::Base64 { media_type, data },
            } => {
                assert_eq!(media_type, IMAGE_MEDIA_TYPE);
                assert_eq!(data, image().as_base64());
            }
            other => panic!("expected image block, got {other:?}"),
        }
    }

    #[test]
    fn test_text_and_image_share_one_message() {
        let messages = build_messages(&[], Some("What's in this image?"), Some(&image())).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].content,
            vec![
                ContentBlock::text("What's in this image?"),
                ContentBlock::image(&image()),
            ]
        );
    }

    #[test]
    fn test_empty_turn_rejected() {
        assert!(matches!(
            build_messages(&[], None, None),
            Err(InferenceError::EmptyTurn)
        ));
        assert!(matches!(
            build_messages(&[], Some(""), Some(&ImageData::from_base64(""))),
            Err(InferenceError::EmptyTurn)
        ));
    }

    #[test]
    fn test_prior_messages_kept_in_order() {
        let prior = vec![
            Message::user_text("Hi"),
            Message::assistant_text("Hello! How can I help?"),
        ];
        let messages = build_messages(&prior, None, Some(&image())).unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(&messages[..2], &prior[..]);
        // The image starts a new message, it is never glued onto prior turns.
        assert_eq!(messages[2].content, vec![ContentBlock::image(&image())]);
    }

    #[test]
    fn test_build_is_idempotent() {
        let prior = vec![Message::user_text("a"), Message::assistant_text("b")];
        let first = build_messages(&prior, Some("c"), Some(&image())).unwrap();
        let second = build_messages(&prior, Some("c"), Some(&image())).unwrap();
        assert_eq!(first, second);
    }
}
