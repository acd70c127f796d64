pub mod prompt;

pub use prompt::PromptConfirm;
