//! Session gate
//!
//! Every inbound message passes through [`SessionGate::check`] before any
//! domain handling. An identified conversation passes straight through; an
//! unidentified one goes through exactly one identification strategy.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::channels::{InboundMessage, OutgoingMessage, ReplyKeyboard, SharedContact};
use crate::db::{Profile, ProfileRepo};
use crate::session::SessionStore;
use crate::{Error, Result};

pub const SHARE_CONTACT_LABEL: &str = "📱 Share Contact";
pub const START_TEXT: &str = "Welcome! Please share your contact to log in.";
pub const NAME_START_TEXT: &str = "Welcome! Send me photos of waste, bills, or food to log them.";
pub const PROMPT_TEXT: &str =
    "Welcome to the Carbon Tracker! 🌱\nTo link your profile, please tap the 'Share Contact' button below.";
pub const PHONE_NOT_FOUND_TEXT: &str =
    "❌ Phone number not found in our records. Please register on the website first.";
pub const FOREIGN_CONTACT_TEXT: &str =
    "❌ Please share your own contact using the button below.";
pub const NAME_NOT_FOUND_TEXT: &str =
    "❌ Your name was not found in our records. Please register on the website first.";
pub const SERVICE_ERROR_TEXT: &str = "⚠️ Application Error. Please try again later.";

fn verified_text(first_name: &str) -> String {
    format!(
        "Verified! ✅ Welcome back, {first_name}.\nYou can now send me photos of waste, bills, or food to log them."
    )
}

/// How unidentified conversations are identified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityStrategy {
    /// Shared (or platform-verified) phone number against `api_profile.phone_no`
    #[default]
    Contact,
    /// Platform display name against `api_profile.display_name`
    DisplayName,
}

impl fmt::Display for IdentityStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Contact => "contact",
            Self::DisplayName => "display_name",
        })
    }
}

impl FromStr for IdentityStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "contact" | "phone" => Ok(Self::Contact),
            "display_name" => Ok(Self::DisplayName),
            other => Err(Error::Config(format!(
                "unknown identity strategy '{other}' (expected 'contact' or 'display_name')"
            ))),
        }
    }
}

/// Why the gate ended the turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStop {
    /// `/start` answered
    Started,
    /// Unidentified sender asked to share a contact
    Prompted,
    /// Contact matched; session established
    Verified,
    /// No matching profile
    Rejected,
    /// Lookup or session store failed
    ServiceError,
}

/// Result of running a message through the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Continue with this profile ID
    Pass { user_id: String },
    /// Turn ends here; send these replies
    Stop {
        reason: GateStop,
        replies: Vec<OutgoingMessage>,
    },
}

impl GateOutcome {
    fn stop(reason: GateStop, reply: OutgoingMessage) -> Self {
        Self::Stop {
            reason,
            replies: vec![reply],
        }
    }
}

/// Identification gate
pub struct SessionGate {
    strategy: IdentityStrategy,
    profiles: ProfileRepo,
    sessions: Arc<dyn SessionStore>,
}

impl SessionGate {
    #[must_use]
    pub fn new(
        strategy: IdentityStrategy,
        profiles: ProfileRepo,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            strategy,
            profiles,
            sessions,
        }
    }

    /// Decide whether the message passes, replying on the sender's behalf if not
    ///
    /// Lookup failures never escape: they become a generic service-error reply.
    pub async fn check(&self, msg: &InboundMessage) -> GateOutcome {
        let key = msg.conversation_key();
        let result = match self.strategy {
            IdentityStrategy::Contact => self.contact_flow(msg, &key).await,
            IdentityStrategy::DisplayName => self.display_name_flow(msg, &key).await,
        };

        result.unwrap_or_else(|e| {
            tracing::error!(
                failure = "database",
                stage = "identification",
                conversation = %key,
                error = %e,
                "identification lookup failed"
            );
            GateOutcome::stop(
                GateStop::ServiceError,
                OutgoingMessage::text(&msg.conversation_id, SERVICE_ERROR_TEXT),
            )
        })
    }

    async fn contact_flow(&self, msg: &InboundMessage, key: &str) -> Result<GateOutcome> {
        let to = msg.conversation_id.as_str();

        if msg.is_start_command() {
            return Ok(GateOutcome::stop(
                GateStop::Started,
                OutgoingMessage::text(to, START_TEXT).with_keyboard(contact_keyboard()),
            ));
        }

        // A shared contact always re-verifies, even inside an existing session
        if let Some(contact) = &msg.contact {
            return self.verify_shared_contact(msg, key, contact).await;
        }

        if let Some(user_id) = self.sessions.get(key).await? {
            return Ok(GateOutcome::Pass { user_id });
        }

        if let Some(phone) = &msg.verified_phone {
            return match self.profiles.find_by_phone(phone)? {
                Some(profile) => {
                    self.establish(key, &profile).await?;
                    Ok(GateOutcome::Pass { user_id: profile.id })
                }
                None => {
                    tracing::info!(conversation = %key, "verified sender phone has no profile");
                    Ok(GateOutcome::stop(
                        GateStop::Rejected,
                        OutgoingMessage::text(to, PHONE_NOT_FOUND_TEXT),
                    ))
                }
            };
        }

        Ok(GateOutcome::stop(
            GateStop::Prompted,
            OutgoingMessage::text(to, PROMPT_TEXT).with_keyboard(contact_keyboard()),
        ))
    }

    async fn verify_shared_contact(
        &self,
        msg: &InboundMessage,
        key: &str,
        contact: &SharedContact,
    ) -> Result<GateOutcome> {
        let to = msg.conversation_id.as_str();

        if !contact.is_own {
            tracing::info!(conversation = %key, "rejected contact card of another user");
            return Ok(GateOutcome::stop(
                GateStop::Rejected,
                OutgoingMessage::text(to, FOREIGN_CONTACT_TEXT).with_keyboard(contact_keyboard()),
            ));
        }

        match self.profiles.find_by_phone(&contact.phone_number)? {
            Some(profile) => {
                self.establish(key, &profile).await?;
                Ok(GateOutcome::stop(
                    GateStop::Verified,
                    OutgoingMessage::text(to, verified_text(&profile.first_name))
                        .with_keyboard(ReplyKeyboard::Remove),
                ))
            }
            None => {
                tracing::info!(conversation = %key, "shared phone number has no profile");
                Ok(GateOutcome::stop(
                    GateStop::Rejected,
                    OutgoingMessage::text(to, PHONE_NOT_FOUND_TEXT)
                        .with_keyboard(ReplyKeyboard::Remove),
                ))
            }
        }
    }

    async fn display_name_flow(&self, msg: &InboundMessage, key: &str) -> Result<GateOutcome> {
        if msg.is_start_command() {
            return Ok(GateOutcome::stop(
                GateStop::Started,
                OutgoingMessage::text(&msg.conversation_id, NAME_START_TEXT),
            ));
        }

        if let Some(user_id) = self.sessions.get(key).await? {
            return Ok(GateOutcome::Pass { user_id });
        }

        let profile = match msg.sender_name.as_deref() {
            Some(name) => self.profiles.find_by_display_name(name)?,
            None => None,
        };

        match profile {
            Some(profile) => {
                self.establish(key, &profile).await?;
                Ok(GateOutcome::Pass { user_id: profile.id })
            }
            None => {
                tracing::info!(conversation = %key, "display name has no profile");
                Ok(GateOutcome::stop(
                    GateStop::Rejected,
                    OutgoingMessage::text(&msg.conversation_id, NAME_NOT_FOUND_TEXT),
                ))
            }
        }
    }

    async fn establish(&self, key: &str, profile: &Profile) -> Result<()> {
        self.sessions.set(key, &profile.id).await?;
        tracing::info!(conversation = %key, user_id = %profile.id, "session established");
        Ok(())
    }
}

fn contact_keyboard() -> ReplyKeyboard {
    ReplyKeyboard::RequestContact {
        label: SHARE_CONTACT_LABEL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::channels::{MessageKind, Platform};
    use crate::db;
    use crate::session::MemorySessionStore;

    fn message(kind: MessageKind) -> InboundMessage {
        InboundMessage {
            platform: Platform::Telegram,
            message_id: "1".to_string(),
            conversation_id: "42".to_string(),
            sender_id: "42".to_string(),
            sender_name: Some("Alice".to_string()),
            kind,
            text: None,
            caption: None,
            media: None,
            contact: None,
            verified_phone: None,
        }
    }

    fn text(body: &str) -> InboundMessage {
        InboundMessage {
            text: Some(body.to_string()),
            ..message(MessageKind::Text)
        }
    }

    fn contact(phone: &str, is_own: bool) -> InboundMessage {
        InboundMessage {
            contact: Some(SharedContact {
                phone_number: phone.to_string(),
                is_own,
            }),
            ..message(MessageKind::Contact)
        }
    }

    fn setup(strategy: IdentityStrategy) -> (SessionGate, ProfileRepo, Arc<MemorySessionStore>) {
        let profiles = ProfileRepo::new(db::init_memory().unwrap());
        let sessions = Arc::new(MemorySessionStore::new());
        let gate = SessionGate::new(strategy, profiles.clone(), sessions.clone());
        (gate, profiles, sessions)
    }

    fn stop_reason(outcome: &GateOutcome) -> Option<GateStop> {
        match outcome {
            GateOutcome::Stop { reason, .. } => Some(*reason),
            GateOutcome::Pass { .. } => None,
        }
    }

    #[tokio::test]
    async fn test_unidentified_text_is_prompted() {
        let (gate, _, _) = setup(IdentityStrategy::Contact);

        let GateOutcome::Stop { reason, replies } = gate.check(&text("I drove 10km")).await else {
            panic!("expected stop");
        };
        assert_eq!(reason, GateStop::Prompted);
        assert_eq!(replies[0].content, PROMPT_TEXT);
        assert!(matches!(replies[0].keyboard, Some(ReplyKeyboard::RequestContact { .. })));
    }

    #[tokio::test]
    async fn test_start_command() {
        let (gate, _, _) = setup(IdentityStrategy::Contact);
        let outcome = gate.check(&text("/start")).await;
        assert_eq!(stop_reason(&outcome), Some(GateStop::Started));
    }

    #[tokio::test]
    async fn test_whatsapp_start_is_ordinary_text() {
        let (gate, profiles, _) = setup(IdentityStrategy::Contact);
        let profile = profiles.create("Carol", Some("+15550001"), None).unwrap();

        let msg = InboundMessage {
            platform: Platform::WhatsApp,
            verified_phone: Some("15550001".to_string()),
            ..text("/start")
        };
        assert_eq!(gate.check(&msg).await, GateOutcome::Pass { user_id: profile.id });
    }

    #[tokio::test]
    async fn test_contact_without_plus_matches_stored_plus_form() {
        let (gate, profiles, sessions) = setup(IdentityStrategy::Contact);
        let profile = profiles.create("Bob", Some("+919876543210"), None).unwrap();

        let GateOutcome::Stop { reason, replies } = gate.check(&contact("919876543210", true)).await
        else {
            panic!("expected stop");
        };
        assert_eq!(reason, GateStop::Verified);
        assert!(replies[0].content.starts_with("Verified! ✅ Welcome back, Bob."));
        assert_eq!(replies[0].keyboard, Some(ReplyKeyboard::Remove));
        assert_eq!(sessions.get("telegram:42").await.unwrap(), Some(profile.id.clone()));

        // Established session now bypasses identification
        assert_eq!(
            gate.check(&text("I drove 10km")).await,
            GateOutcome::Pass { user_id: profile.id }
        );
    }

    #[tokio::test]
    async fn test_contact_matches_raw_stored_form() {
        let (gate, profiles, _) = setup(IdentityStrategy::Contact);
        profiles.create("Bob", Some("919876543210"), None).unwrap();

        let outcome = gate.check(&contact("919876543210", true)).await;
        assert_eq!(stop_reason(&outcome), Some(GateStop::Verified));
    }

    #[tokio::test]
    async fn test_unknown_contact_is_rejected() {
        let (gate, _, sessions) = setup(IdentityStrategy::Contact);

        let GateOutcome::Stop { reason, replies } = gate.check(&contact("15550000", true)).await
        else {
            panic!("expected stop");
        };
        assert_eq!(reason, GateStop::Rejected);
        assert_eq!(replies[0].content, PHONE_NOT_FOUND_TEXT);
        assert!(sessions.get("telegram:42").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_foreign_contact_card_is_rejected() {
        let (gate, profiles, sessions) = setup(IdentityStrategy::Contact);
        profiles.create("Bob", Some("+15551234"), None).unwrap();

        let outcome = gate.check(&contact("+15551234", false)).await;
        assert_eq!(stop_reason(&outcome), Some(GateStop::Rejected));
        assert!(sessions.get("telegram:42").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_verified_phone_passes_in_same_turn() {
        let (gate, profiles, _) = setup(IdentityStrategy::Contact);
        let profile = profiles.create("Carol", Some("+15550001"), None).unwrap();

        let msg = InboundMessage {
            platform: Platform::WhatsApp,
            verified_phone: Some("15550001".to_string()),
            ..text("two bags of trash")
        };
        assert_eq!(gate.check(&msg).await, GateOutcome::Pass { user_id: profile.id });

        let stranger = InboundMessage {
            platform: Platform::WhatsApp,
            conversation_id: "15559999".to_string(),
            verified_phone: Some("15559999".to_string()),
            ..text("hello")
        };
        assert_eq!(stop_reason(&gate.check(&stranger).await), Some(GateStop::Rejected));
    }

    #[tokio::test]
    async fn test_display_name_flow() {
        let (gate, profiles, _) = setup(IdentityStrategy::DisplayName);
        let profile = profiles.create("Alice", None, Some("Alice")).unwrap();

        assert_eq!(
            gate.check(&text("hello")).await,
            GateOutcome::Pass { user_id: profile.id }
        );

        let other = InboundMessage {
            conversation_id: "7".to_string(),
            sender_name: Some("alice".to_string()),
            ..text("hello")
        };
        let GateOutcome::Stop { reason, replies } = gate.check(&other).await else {
            panic!("expected stop");
        };
        assert_eq!(reason, GateStop::Rejected);
        assert_eq!(replies[0].content, NAME_NOT_FOUND_TEXT);
    }

    #[tokio::test]
    async fn test_display_name_start_is_answered() {
        let (gate, profiles, sessions) = setup(IdentityStrategy::DisplayName);
        profiles.create("Alice", None, Some("Alice")).unwrap();

        let GateOutcome::Stop { reason, replies } = gate.check(&text("/start")).await else {
            panic!("expected stop");
        };
        assert_eq!(reason, GateStop::Started);
        assert_eq!(replies[0].content, NAME_START_TEXT);
        assert!(replies[0].keyboard.is_none());
        assert!(sessions.get("telegram:42").await.unwrap().is_none());
    }

    struct BrokenStore;

    #[async_trait]
    impl SessionStore for BrokenStore {
        async fn get(&self, _: &str) -> Result<Option<String>> {
            Err(Error::Database("pool exhausted".to_string()))
        }
        async fn set(&self, _: &str, _: &str) -> Result<()> {
            Err(Error::Database("pool exhausted".to_string()))
        }
        async fn delete(&self, _: &str) -> Result<bool> {
            Err(Error::Database("pool exhausted".to_string()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_becomes_service_error() {
        let profiles = ProfileRepo::new(db::init_memory().unwrap());
        let gate = SessionGate::new(IdentityStrategy::Contact, profiles, Arc::new(BrokenStore));

        let GateOutcome::Stop { reason, replies } = gate.check(&text("hi")).await else {
            panic!("expected stop");
        };
        assert_eq!(reason, GateStop::ServiceError);
        assert_eq!(replies[0].content, SERVICE_ERROR_TEXT);
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("contact".parse::<IdentityStrategy>().unwrap(), IdentityStrategy::Contact);
        assert_eq!(
            "display-name".parse::<IdentityStrategy>().unwrap(),
            IdentityStrategy::DisplayName
        );
        assert!("email".parse::<IdentityStrategy>().is_err());
    }
}
