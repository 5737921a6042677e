//! Staff alerts for new leads: Pushover pushes, Twilio SMS, WhatsApp and
//! voice calls, plus the TwiML documents those calls and webhooks use.

pub mod error;
pub mod pushover;
pub mod signature;
pub mod staff;
pub mod twilio;
pub mod twiml;

pub use error::NotifyError;
pub use pushover::PushoverClient;
pub use signature::{twilio_signature, verify_twilio_signature, SIGNATURE_HEADER};
pub use staff::{ChannelOutcome, LeadSummary, StaffAlert, StaffNotifier};
pub use twilio::TwilioClient;
