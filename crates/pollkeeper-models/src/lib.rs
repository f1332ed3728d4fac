pub mod poll;

pub use poll::{AnswerInput, CreatePollInput, Poll};
