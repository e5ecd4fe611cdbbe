pub mod booking;
pub mod conversation;
pub mod question;

pub use booking::{BookingExtraction, BookingRecord, StoredAppointment};
pub use conversation::{ConversationState, Phase, Speaker, TranscriptEntry};
pub use question::{default_questions, AnswerSet, FieldName, Question};
