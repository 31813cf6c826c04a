// For `error_chain!`
#![recursion_limit = "1024"]

#[macro_use]
extern crate serde_derive;

extern crate chrono;
extern crate serde;
extern crate serde_json;

#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate log;

pub mod errors {
    error_chain! {
        errors {
            /// Bad caller input, such as an empty topic list.
            InvalidInput(t: String) {
                description("invalid input")
                display("invalid input: {}", t)
            }
            /// A filesystem failure while saving or loading a plan.
            Persistence(t: String) {
                description("persistence error")
                display("{}", t)
            }
            /// A JSON error (usually caused by `serde_json::Error`).
            Json(t: String) {
                description("json error")
                display("{}", t)
            }
            /// Text could not be extracted from a document.
            Extraction(t: String) {
                description("text extraction error")
                display("text extraction failed: {}", t)
            }
            /// The card generation backend failed or returned something unusable.
            Generation(t: String) {
                description("generation error")
                display("generation failed: {}", t)
            }
            /// No API key was configured for the generation backend.
            MissingApiKey {
                description("missing api key")
                display("no API key configured (set GEMINI_API_KEY or pass --api-key)")
            }
            /// The user's data directory could not be found or deduced.
            CannotLocateDataDir {
                description("cannot locate data directory")
            }
            /// The plans directory does not exist (no plan has been saved yet).
            NoPlansDirectory {
                description("plans directory does not exist")
            }
            /// The specified plan does not exist (includes the name of the plan).
            PlanDoesNotExist(name: String) {
                description("plan does not exist")
                display("plan '{}' does not exist", name)
            }
        }
    }
}

pub use errors::*;

pub mod cards;
pub mod files;
pub mod plan;
pub mod reader;

pub use cards::{CardService, CompletionModel, Flashcard, GeminiClient, GeminiConfig, QuizQuestion};
pub use plan::{compute_plan, make_plan, PlanOptions, ScheduleEntry, SchedulePlan};
