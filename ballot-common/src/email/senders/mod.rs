mod fallback;
mod mock_sender;
mod smtp;

pub use fallback::FallbackSender;
pub use mock_sender::MockSender;
pub use smtp::SmtpSender;
