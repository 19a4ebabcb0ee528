mod mailer;
mod message;
mod transport;

pub use mailer::Mailer;
pub use message::OutgoingMessage;
pub use transport::{GmailTransport, MailTransport};
