mod error_classification;
mod session_lifecycle;
