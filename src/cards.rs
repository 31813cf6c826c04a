//! Flashcard and quiz generation from chunks of study text.
//!
//! Generation goes through a `CompletionModel`, which turns a prompt into
//! raw text. The `GeminiClient` implementation talks to Google's Gemini API;
//! tests (and anything else) can plug in their own model. Model output is
//! only loosely trusted: code fences are stripped, the remaining text must
//! be a JSON array, and entries that don't have the expected shape are
//! dropped.
//!
//! Every generation call returns a plain `Result`. Presentation code that
//! always wants something to show can use `flashcards_or_sentinel` and
//! `quiz_or_sentinel`, which turn a failure into a single placeholder entry.

use std::env;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::errors::*;

/// The Gemini endpoint, without the model path.
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
/// The model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Number of cards or questions requested per call.
const ITEMS_PER_REQUEST: usize = 5;
/// Quiz questions this short (in characters) are assumed to be junk.
const MIN_QUESTION_CHARS: usize = 15;
/// Every quiz question must offer exactly this many options.
const QUIZ_OPTIONS: usize = 4;

/// A single question/answer flashcard.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
}

impl Flashcard {
    /// The placeholder shown in place of real cards when generation fails.
    pub fn sentinel(reason: &str) -> Flashcard {
        Flashcard {
            question: "Flashcard generation failed".into(),
            answer: reason.into(),
        }
    }
}

/// A multiple-choice question. `answer` is normally one of `options`,
/// but the model isn't forced to comply.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
}

impl QuizQuestion {
    /// The placeholder shown in place of a real quiz when generation fails.
    pub fn sentinel(reason: &str) -> QuizQuestion {
        QuizQuestion {
            question: format!("Quiz generation failed: {}", reason),
            options: vec!["Error".into(), "Check API".into(), "Invalid Key".into(), "Retry".into()],
            answer: "Error".into(),
        }
    }
}

/// Something that can complete a text prompt.
pub trait CompletionModel {
    /// Sends the prompt and returns the model's raw text reply.
    fn complete(&self, prompt: &str) -> Result<String>;
}

/// Connection settings for the Gemini API. These are always passed to
/// `GeminiClient::new` explicitly; nothing is read from the environment
/// unless `from_env` is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Returns a configuration for the default model and endpoint.
    pub fn new(api_key: &str) -> GeminiConfig {
        GeminiConfig {
            api_key: api_key.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Reads `GEMINI_API_KEY` and, if set, `GEMINI_MODEL`.
    pub fn from_env() -> Result<GeminiConfig> {
        GeminiConfig::from_vars(|k| env::var(k).ok())
    }

    fn from_vars<F: Fn(&str) -> Option<String>>(var: F) -> Result<GeminiConfig> {
        let key = match var("GEMINI_API_KEY") {
            Some(ref k) if !k.trim().is_empty() => k.trim().to_owned(),
            _ => return Err(ErrorKind::MissingApiKey.into()),
        };
        let mut config = GeminiConfig::new(&key);
        if let Some(model) = var("GEMINI_MODEL").filter(|m| !m.trim().is_empty()) {
            config.model = model.trim().to_owned();
        }
        Ok(config)
    }

    /// Sets the model name, e.g. `gemini-1.5-flash`.
    pub fn model(mut self, model: &str) -> GeminiConfig {
        self.model = model.to_owned();
        self
    }
}

#[derive(Serialize, Debug)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Serialize, Debug)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize, Debug)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    /// Joins the text parts of the first candidate.
    fn into_text(self) -> Result<String> {
        let content = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .ok_or_else(|| Error::from(ErrorKind::Generation("response had no candidates".into())))?;
        let text: String = content.parts.into_iter().map(|p| p.text).collect();
        if text.trim().is_empty() {
            bail!(ErrorKind::Generation("response text was empty".into()));
        }
        Ok(text)
    }
}

/// A blocking client for the Gemini `generateContent` API.
pub struct GeminiClient {
    config: GeminiConfig,
    http: Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<GeminiClient> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .chain_err(|| ErrorKind::Generation("could not build http client".into()))?;
        Ok(GeminiClient {
            config: config,
            http: http,
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent",
                self.config.endpoint.trim_end_matches('/'),
                self.config.model)
    }
}

impl CompletionModel for GeminiClient {
    fn complete(&self, prompt: &str) -> Result<String> {
        let body = GenerateRequest {
            contents: vec![RequestContent { parts: vec![RequestPart { text: prompt }] }],
        };

        debug!("sending {} character prompt to {}", prompt.len(), self.config.model);
        let response = self
            .http
            .post(&self.url())
            .header("x-goog-api-key", self.config.api_key.as_str())
            .json(&body)
            .send()
            .chain_err(|| ErrorKind::Generation("request to Gemini failed".into()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            bail!(ErrorKind::Generation(format!("Gemini returned {}: {}", status, text.trim())));
        }

        let parsed: GenerateResponse = response
            .json()
            .chain_err(|| ErrorKind::Generation("could not decode Gemini response".into()))?;
        parsed.into_text()
    }
}

/// Generates flashcards and quizzes with a completion model.
pub struct CardService<M> {
    model: M,
}

impl<M: CompletionModel> CardService<M> {
    pub fn new(model: M) -> CardService<M> {
        CardService { model: model }
    }

    /// Asks for five concise question/answer pairs about `text`.
    pub fn generate_flashcards(&self, text: &str) -> Result<Vec<Flashcard>> {
        let prompt = format!(
            r#"You are a flashcard generator for students.
Create {} concise Q&A pairs from this text.

Return only valid JSON, in this exact format:
[
  {{"question": "What is ...?", "answer": "It is ..."}}
]

Text:
{}"#,
            ITEMS_PER_REQUEST,
            text
        );

        let reply = self.model.complete(&prompt)?;
        let cards: Vec<Flashcard> = parse_json_list(&reply)?;
        if cards.is_empty() {
            bail!(ErrorKind::Generation("no usable flashcards in response".into()));
        }
        info!("generated {} flashcards", cards.len());
        Ok(cards)
    }

    /// Asks for five multiple-choice questions about `text`, each with four
    /// options. `context_title` names the material in the prompt.
    pub fn generate_quiz(&self, text: &str, context_title: &str) -> Result<Vec<QuizQuestion>> {
        let prompt = format!(
            r#"You are a professional education content generator.

Based on the text provided below, create exactly {} multiple-choice questions.
Each question should:
- Be related directly to the content
- Have 4 clear and non-overlapping options
- Have exactly one correct answer, repeated in "answer"
- Focus on technical and conceptual understanding

Return only valid JSON in this format:
[
  {{"question": "What is the main function of ...?", "options": ["A", "B", "C", "D"], "answer": "C"}}
]

Context: {}
Text:
{}"#,
            ITEMS_PER_REQUEST,
            context_title,
            text
        );

        let reply = self.model.complete(&prompt)?;
        let quiz: Vec<QuizQuestion> = parse_json_list::<QuizQuestion>(&reply)?
            .into_iter()
            .filter(|q| q.question.trim().chars().count() > MIN_QUESTION_CHARS)
            .filter(|q| q.options.len() == QUIZ_OPTIONS)
            .collect();
        if quiz.is_empty() {
            bail!(ErrorKind::Generation("no usable quiz questions in response".into()));
        }
        info!("generated {} quiz questions", quiz.len());
        Ok(quiz)
    }
}

/// Generates flashcards, replacing any failure with a single sentinel card.
pub fn flashcards_or_sentinel<M: CompletionModel>(service: &CardService<M>,
                                                  text: &str)
                                                  -> Vec<Flashcard> {
    service.generate_flashcards(text).unwrap_or_else(|e| {
        warn!("flashcard generation failed: {}", e);
        vec![Flashcard::sentinel(&e.to_string())]
    })
}

/// Generates a quiz, replacing any failure with a single sentinel question.
pub fn quiz_or_sentinel<M: CompletionModel>(service: &CardService<M>,
                                            text: &str,
                                            context_title: &str)
                                            -> Vec<QuizQuestion> {
    service.generate_quiz(text, context_title).unwrap_or_else(|e| {
        warn!("quiz generation failed: {}", e);
        vec![QuizQuestion::sentinel(&e.to_string())]
    })
}

/// Removes Markdown code fences (with or without a `json` tag) that models
/// like to wrap their JSON in.
fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .trim()
        .to_owned()
}

/// Parses a model reply as a JSON array, keeping the entries that
/// deserialize as `T`.
fn parse_json_list<T: DeserializeOwned>(reply: &str) -> Result<Vec<T>> {
    let cleaned = strip_code_fences(reply);
    let value: Value = serde_json::from_str(&cleaned)
        .chain_err(|| ErrorKind::Generation(format!("reply was not valid JSON: {}", cleaned)))?;

    match value {
        Value::Array(items) => {
            let total = items.len();
            let kept: Vec<T> = items.into_iter().filter_map(|v| serde_json::from_value(v).ok()).collect();
            if kept.len() < total {
                debug!("dropped {} malformed entries from reply", total - kept.len());
            }
            Ok(kept)
        }
        other => Err(ErrorKind::Generation(format!("expected a JSON array, got: {}", other)).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::thread;

    /// Replies with canned text, or fails when there is none, and
    /// remembers the last prompt.
    struct Canned {
        reply: Option<&'static str>,
        last_prompt: RefCell<String>,
    }

    impl Canned {
        fn replying(reply: &'static str) -> CardService<Canned> {
            CardService::new(Canned {
                reply: Some(reply),
                last_prompt: RefCell::new(String::new()),
            })
        }

        fn failing() -> CardService<Canned> {
            CardService::new(Canned {
                reply: None,
                last_prompt: RefCell::new(String::new()),
            })
        }
    }

    impl CompletionModel for Canned {
        fn complete(&self, prompt: &str) -> Result<String> {
            *self.last_prompt.borrow_mut() = prompt.to_owned();
            match self.reply {
                Some(r) => Ok(r.to_owned()),
                None => Err(ErrorKind::Generation("backend unavailable".into()).into()),
            }
        }
    }

    #[test]
    fn flashcards_from_fenced_json() {
        let service = Canned::replying("```json\n[{\"question\": \"What is Rust?\", \"answer\": \
                                        \"A language\"}]\n```");
        let cards = service.generate_flashcards("Rust is a language.").unwrap();
        assert_eq!(cards,
                   vec![Flashcard {
                            question: "What is Rust?".into(),
                            answer: "A language".into(),
                        }]);
        assert!(service.model.last_prompt.borrow().contains("Rust is a language."));
    }

    #[test]
    fn malformed_entries_are_dropped() {
        let service = Canned::replying(r#"[{"question": "Q?"}, {"question": "Q2?", "answer": "A2"}]"#);
        let cards = service.generate_flashcards("text").unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].answer, "A2");
    }

    #[test]
    fn non_array_reply_is_generation_error() {
        let service = Canned::replying(r#"{"question": "Q?", "answer": "A"}"#);
        match service.generate_flashcards("text") {
            Err(Error(ErrorKind::Generation(_), _)) => {}
            other => panic!("expected generation error, got {:?}", other),
        }
    }

    #[test]
    fn invalid_json_becomes_sentinel() {
        let service = Canned::replying("Sure! Here are your flashcards:");
        let cards = flashcards_or_sentinel(&service, "text");
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].question, Flashcard::sentinel("").question);
    }

    #[test]
    fn backend_failure_becomes_sentinel() {
        let service = Canned::failing();
        let cards = flashcards_or_sentinel(&service, "text");
        assert_eq!(cards.len(), 1);
        assert!(cards[0].answer.contains("backend unavailable"));

        let quiz = quiz_or_sentinel(&service, "text", "Notes");
        assert_eq!(quiz.len(), 1);
        assert_eq!(quiz[0].options.len(), 4);
        assert_eq!(quiz[0].answer, "Error");
    }

    #[test]
    fn short_quiz_questions_are_filtered() {
        let service = Canned::replying(r#"```
[
  {"question": "Why?", "options": ["a", "b", "c", "d"], "answer": "a"},
  {"question": "Which layer handles routing?", "options": ["Network", "Link", "Transport", "Session"], "answer": "Network"}
]
```"#);
        let quiz = service.generate_quiz("text", "Networking").unwrap();
        assert_eq!(quiz.len(), 1);
        assert_eq!(quiz[0].answer, "Network");
        assert!(service.model.last_prompt.borrow().contains("Context: Networking"));
    }

    #[test]
    fn quiz_with_only_short_questions_is_an_error() {
        let service = Canned::replying(r#"[{"question": "Why?", "options": ["a", "b", "c", "d"], "answer": "a"}]"#);
        assert!(service.generate_quiz("text", "Notes").is_err());
        assert_eq!(quiz_or_sentinel(&service, "text", "Notes").len(), 1);
    }

    #[test]
    fn quiz_questions_need_four_options() {
        let service = Canned::replying(r#"[
  {"question": "Which layer handles routing here?", "options": [], "answer": "Network"},
  {"question": "Which layer handles framing here?", "options": ["Link", "Network"], "answer": "Link"},
  {"question": "Which layer handles ports here?", "options": ["Network", "Link", "Transport", "Session"], "answer": "Transport"}
]"#);
        let quiz = service.generate_quiz("text", "Networking").unwrap();
        assert_eq!(quiz.len(), 1);
        assert_eq!(quiz[0].answer, "Transport");
        assert_eq!(quiz[0].options.len(), 4);
    }

    #[test]
    fn quiz_without_four_options_becomes_sentinel() {
        let service = Canned::replying(r#"[{"question": "Which layer handles routing here?", "options": [], "answer": "Network"}]"#);
        match service.generate_quiz("text", "Networking") {
            Err(Error(ErrorKind::Generation(_), _)) => {}
            other => panic!("expected generation error, got {:?}", other),
        }
        let quiz = quiz_or_sentinel(&service, "text", "Networking");
        assert_eq!(quiz.len(), 1);
        assert_eq!(quiz[0].answer, "Error");
    }

    /// Serves a single canned HTTP response on a local port and returns the
    /// endpoint to point a client at.
    fn serve_once(status: u16, body: &'static str) -> String {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        thread::spawn(move || {
            if let Ok(request) = server.recv() {
                let response = tiny_http::Response::from_string(body).with_status_code(status);
                let _ = request.respond(response);
            }
        });
        format!("http://{}", addr)
    }

    fn local_client(endpoint: String) -> GeminiClient {
        let mut config = GeminiConfig::new("k");
        config.endpoint = endpoint;
        GeminiClient {
            config: config,
            http: Client::builder().no_proxy().build().unwrap(),
        }
    }

    #[test]
    fn error_status_is_generation_error() {
        let client = local_client(serve_once(429, "quota exceeded"));
        match client.complete("hello") {
            Err(Error(ErrorKind::Generation(msg), _)) => {
                assert!(msg.contains("429"), "{}", msg);
                assert!(msg.contains("quota exceeded"), "{}", msg);
            }
            other => panic!("expected generation error, got {:?}", other),
        }
    }

    #[test]
    fn successful_reply_is_returned() {
        let client = local_client(serve_once(200,
                                             r#"{"candidates": [{"content": {"parts": [{"text": "[]"}]}}]}"#));
        assert_eq!(client.complete("hello").unwrap(), "[]");
    }

    #[test]
    fn config_from_vars() {
        let config = GeminiConfig::from_vars(|k| match k {
                "GEMINI_API_KEY" => Some(" secret ".into()),
                "GEMINI_MODEL" => Some("gemini-1.5-flash".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.model, "gemini-1.5-flash");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);

        let defaulted = GeminiConfig::from_vars(|k| match k {
                "GEMINI_API_KEY" => Some("secret".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(defaulted.model, DEFAULT_MODEL);

        match GeminiConfig::from_vars(|_| None) {
            Err(Error(ErrorKind::MissingApiKey, _)) => {}
            other => panic!("expected missing key, got {:?}", other),
        }
    }

    #[test]
    fn request_body_shape() {
        let body = GenerateRequest {
            contents: vec![RequestContent { parts: vec![RequestPart { text: "hello" }] }],
        };
        assert_eq!(serde_json::to_value(&body).unwrap(),
                   serde_json::json!({"contents": [{"parts": [{"text": "hello"}]}]}));
    }

    #[test]
    fn response_text_is_joined() {
        let response: GenerateResponse = serde_json::from_str(r#"{
            "candidates": [{"content": {"parts": [{"text": "[1, "}, {"text": "2]"}], "role": "model"}}]
        }"#)
            .unwrap();
        assert_eq!(response.into_text().unwrap(), "[1, 2]");

        let empty: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.into_text().is_err());
    }

    #[test]
    fn client_url() {
        let config = GeminiConfig::new("k").model("gemini-1.5-flash");
        let client = GeminiClient::new(config).unwrap();
        assert_eq!(client.url(),
                   "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent");
    }
}
