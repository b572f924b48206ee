pub mod guardrail;
pub mod lexical;
pub mod metadata;
pub mod osis;
