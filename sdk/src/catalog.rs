//! Endpoint tables for the Watson service families.
//!
//! Each family is a static [`ServiceDefinition`]; operations are looked up by
//! name at call time. Only a representative set of operations per family is
//! listed. Anything else can be called through a hand-built descriptor.

use std::{fmt, str::FromStr};

use crate::{
    endpoint::{BodyKind, EndpointDescriptor, Method, Param, ServiceDefinition},
    error::Error,
};

/// A Watson service family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Assistant,
    Conversation,
    Discovery,
    SpeechToText,
    TextToSpeech,
    ToneAnalyzer,
    VisualRecognition,
    PersonalityInsights,
    LanguageTranslator,
    CompareComply,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 10] = [
        ServiceKind::Assistant,
        ServiceKind::Conversation,
        ServiceKind::Discovery,
        ServiceKind::SpeechToText,
        ServiceKind::TextToSpeech,
        ServiceKind::ToneAnalyzer,
        ServiceKind::VisualRecognition,
        ServiceKind::PersonalityInsights,
        ServiceKind::LanguageTranslator,
        ServiceKind::CompareComply,
    ];

    /// Returns the static definition for this family.
    pub fn definition(&self) -> &'static ServiceDefinition {
        match self {
            ServiceKind::Assistant => &ASSISTANT,
            ServiceKind::Conversation => &CONVERSATION,
            ServiceKind::Discovery => &DISCOVERY,
            ServiceKind::SpeechToText => &SPEECH_TO_TEXT,
            ServiceKind::TextToSpeech => &TEXT_TO_SPEECH,
            ServiceKind::ToneAnalyzer => &TONE_ANALYZER,
            ServiceKind::VisualRecognition => &VISUAL_RECOGNITION,
            ServiceKind::PersonalityInsights => &PERSONALITY_INSIGHTS,
            ServiceKind::LanguageTranslator => &LANGUAGE_TRANSLATOR,
            ServiceKind::CompareComply => &COMPARE_COMPLY,
        }
    }

    /// Kebab-case name, also used as the environment variable prefix.
    pub fn name(&self) -> &'static str {
        self.definition().name
    }

    /// Parses a family name. Accepts kebab-case, snake_case and a few
    /// common aliases (`stt`, `tts`, `wa`).
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        let kind = match normalized.as_str() {
            "assistant" | "wa" => ServiceKind::Assistant,
            "conversation" => ServiceKind::Conversation,
            "discovery" => ServiceKind::Discovery,
            "speech-to-text" | "stt" => ServiceKind::SpeechToText,
            "text-to-speech" | "tts" => ServiceKind::TextToSpeech,
            "tone-analyzer" | "tone" => ServiceKind::ToneAnalyzer,
            "visual-recognition" | "vr" => ServiceKind::VisualRecognition,
            "personality-insights" | "pi" => ServiceKind::PersonalityInsights,
            "language-translator" | "translator" => ServiceKind::LanguageTranslator,
            "compare-comply" | "compare-and-comply" => ServiceKind::CompareComply,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ServiceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceKind::from_name(s).ok_or_else(|| Error::argument(format!("unknown service {s:?}")))
    }
}

// Assistant

pub static ASSISTANT: ServiceDefinition = ServiceDefinition {
    name: "assistant",
    default_url: "https://gateway.watsonplatform.net/assistant/api",
    version: Some("2018-09-20"),
    endpoints: &[
        EndpointDescriptor::rest(
            "message",
            Method::Post,
            "/v1/workspaces/{workspace_id}/message",
            &[Param::path("workspace_id"), Param::query("nodes_visited_details")],
        )
        .with_body(BodyKind::Json, false),
        EndpointDescriptor::rest(
            "list_workspaces",
            Method::Get,
            "/v1/workspaces",
            &[
                Param::query("page_limit"),
                Param::query("include_count"),
                Param::query("sort"),
                Param::query("cursor"),
                Param::query("include_audit"),
            ],
        ),
        EndpointDescriptor::rest(
            "get_workspace",
            Method::Get,
            "/v1/workspaces/{workspace_id}",
            &[
                Param::path("workspace_id"),
                Param::query("export"),
                Param::query("include_audit"),
            ],
        ),
        EndpointDescriptor::rest("create_workspace", Method::Post, "/v1/workspaces", &[])
            .with_body(BodyKind::Json, false),
        EndpointDescriptor::rest(
            "delete_workspace",
            Method::Delete,
            "/v1/workspaces/{workspace_id}",
            &[Param::path("workspace_id")],
        ),
        EndpointDescriptor::rest(
            "list_intents",
            Method::Get,
            "/v1/workspaces/{workspace_id}/intents",
            &[
                Param::path("workspace_id"),
                Param::query("export"),
                Param::query("page_limit"),
                Param::query("cursor"),
            ],
        ),
        EndpointDescriptor::rest(
            "list_entities",
            Method::Get,
            "/v1/workspaces/{workspace_id}/entities",
            &[Param::path("workspace_id"), Param::query("export")],
        ),
    ],
};

// Conversation

pub static CONVERSATION: ServiceDefinition = ServiceDefinition {
    name: "conversation",
    default_url: "https://gateway.watsonplatform.net/conversation/api",
    version: Some("2018-02-16"),
    endpoints: &[
        EndpointDescriptor::rest(
            "message",
            Method::Post,
            "/v1/workspaces/{workspace_id}/message",
            &[Param::path("workspace_id"), Param::query("nodes_visited_details")],
        )
        .with_body(BodyKind::Json, false),
        EndpointDescriptor::rest(
            "list_workspaces",
            Method::Get,
            "/v1/workspaces",
            &[Param::query("page_limit"), Param::query("cursor")],
        ),
    ],
};

// Discovery

pub static DISCOVERY: ServiceDefinition = ServiceDefinition {
    name: "discovery",
    default_url: "https://gateway.watsonplatform.net/discovery/api",
    version: Some("2018-12-03"),
    endpoints: &[
        EndpointDescriptor::rest(
            "list_environments",
            Method::Get,
            "/v1/environments",
            &[Param::query("name")],
        ),
        EndpointDescriptor::rest(
            "get_environment",
            Method::Get,
            "/v1/environments/{environment_id}",
            &[Param::path("environment_id")],
        ),
        EndpointDescriptor::rest(
            "list_collections",
            Method::Get,
            "/v1/environments/{environment_id}/collections",
            &[Param::path("environment_id"), Param::query("name")],
        ),
        EndpointDescriptor::rest(
            "query",
            Method::Get,
            "/v1/environments/{environment_id}/collections/{collection_id}/query",
            &[
                Param::path("environment_id"),
                Param::path("collection_id"),
                Param::query("filter"),
                Param::query("query"),
                Param::query("natural_language_query"),
                Param::query("count"),
                Param::query("offset"),
                Param::query("return"),
                Param::query("sort"),
            ],
        ),
        EndpointDescriptor::rest(
            "add_document",
            Method::Post,
            "/v1/environments/{environment_id}/collections/{collection_id}/documents",
            &[
                Param::path("environment_id"),
                Param::path("collection_id"),
                Param::form("file"),
                Param::form("metadata"),
            ],
        )
        .with_body(BodyKind::Multipart, true),
        EndpointDescriptor::rest(
            "delete_document",
            Method::Delete,
            "/v1/environments/{environment_id}/collections/{collection_id}/documents/{document_id}",
            &[
                Param::path("environment_id"),
                Param::path("collection_id"),
                Param::path("document_id"),
            ],
        ),
    ],
};

// Speech to Text

pub static SPEECH_TO_TEXT: ServiceDefinition = ServiceDefinition {
    name: "speech-to-text",
    default_url: "https://stream.watsonplatform.net/speech-to-text/api",
    version: None,
    endpoints: &[
        EndpointDescriptor::rest("list_models", Method::Get, "/v1/models", &[]),
        EndpointDescriptor::rest(
            "get_model",
            Method::Get,
            "/v1/models/{model_id}",
            &[Param::path("model_id")],
        ),
        EndpointDescriptor::rest(
            "recognize",
            Method::Post,
            "/v1/recognize",
            &[
                Param::query("model"),
                Param::query("customization_id"),
                Param::query("inactivity_timeout"),
                Param::query("keywords"),
                Param::query("keywords_threshold"),
                Param::query("max_alternatives"),
                Param::query("word_confidence"),
                Param::query("timestamps"),
                Param::query("profanity_filter"),
                Param::query("smart_formatting"),
                Param::query("speaker_labels"),
            ],
        )
        .with_body(BodyKind::Raw, true),
        EndpointDescriptor::duplex(
            "recognize_stream",
            "/v1/recognize",
            &[
                Param::query("model"),
                Param::query("customization_id"),
                Param::query("x-watson-learning-opt-out"),
            ],
        ),
        EndpointDescriptor::rest(
            "create_job",
            Method::Post,
            "/v1/recognitions",
            &[
                Param::query("model"),
                Param::query("callback_url"),
                Param::query("events"),
                Param::query("user_token"),
            ],
        )
        .with_body(BodyKind::Raw, true),
        EndpointDescriptor::rest("check_jobs", Method::Get, "/v1/recognitions", &[]),
        EndpointDescriptor::rest(
            "check_job",
            Method::Get,
            "/v1/recognitions/{id}",
            &[Param::path("id")],
        ),
    ],
};

// Text to Speech

pub static TEXT_TO_SPEECH: ServiceDefinition = ServiceDefinition {
    name: "text-to-speech",
    default_url: "https://stream.watsonplatform.net/text-to-speech/api",
    version: None,
    endpoints: &[
        EndpointDescriptor::rest("list_voices", Method::Get, "/v1/voices", &[]),
        EndpointDescriptor::rest(
            "get_voice",
            Method::Get,
            "/v1/voices/{voice}",
            &[Param::path("voice"), Param::query("customization_id")],
        ),
        EndpointDescriptor::rest(
            "synthesize",
            Method::Post,
            "/v1/synthesize",
            &[
                Param::query("voice"),
                Param::query("customization_id"),
                Param::query("accept"),
                Param::header("Accept"),
            ],
        )
        .with_body(BodyKind::Json, true)
        .binary_response(),
        EndpointDescriptor::duplex(
            "synthesize_stream",
            "/v1/synthesize",
            &[
                Param::query("voice"),
                Param::query("customization_id"),
                Param::query("x-watson-learning-opt-out"),
            ],
        ),
        EndpointDescriptor::rest(
            "get_pronunciation",
            Method::Get,
            "/v1/pronunciation",
            &[
                Param::required_query("text"),
                Param::query("voice"),
                Param::query("format"),
            ],
        ),
    ],
};

// Tone Analyzer

pub static TONE_ANALYZER: ServiceDefinition = ServiceDefinition {
    name: "tone-analyzer",
    default_url: "https://gateway.watsonplatform.net/tone-analyzer/api",
    version: Some("2017-09-21"),
    endpoints: &[
        EndpointDescriptor::rest(
            "tone",
            Method::Post,
            "/v3/tone",
            &[
                Param::query("sentences"),
                Param::query("tones"),
                Param::header("Content-Language"),
                Param::header("Accept-Language"),
            ],
        )
        .with_body(BodyKind::Json, true),
        EndpointDescriptor::rest(
            "tone_chat",
            Method::Post,
            "/v3/tone_chat",
            &[Param::header("Content-Language"), Param::header("Accept-Language")],
        )
        .with_body(BodyKind::Json, true),
    ],
};

// Visual Recognition

pub static VISUAL_RECOGNITION: ServiceDefinition = ServiceDefinition {
    name: "visual-recognition",
    default_url: "https://gateway.watsonplatform.net/visual-recognition/api",
    version: Some("2018-03-19"),
    endpoints: &[
        EndpointDescriptor::rest(
            "classify",
            Method::Post,
            "/v3/classify",
            &[
                Param::form("images_file"),
                Param::form("url"),
                Param::form("threshold"),
                Param::form("owners"),
                Param::form("classifier_ids"),
                Param::header("Accept-Language"),
            ],
        )
        .with_body(BodyKind::Multipart, false),
        EndpointDescriptor::rest(
            "detect_faces",
            Method::Post,
            "/v3/detect_faces",
            &[Param::form("images_file"), Param::form("url")],
        )
        .with_body(BodyKind::Multipart, false),
        EndpointDescriptor::rest(
            "list_classifiers",
            Method::Get,
            "/v3/classifiers",
            &[Param::query("verbose")],
        ),
        EndpointDescriptor::rest(
            "get_classifier",
            Method::Get,
            "/v3/classifiers/{classifier_id}",
            &[Param::path("classifier_id")],
        ),
        EndpointDescriptor::rest(
            "delete_classifier",
            Method::Delete,
            "/v3/classifiers/{classifier_id}",
            &[Param::path("classifier_id")],
        ),
    ],
};

// Personality Insights

pub static PERSONALITY_INSIGHTS: ServiceDefinition = ServiceDefinition {
    name: "personality-insights",
    default_url: "https://gateway.watsonplatform.net/personality-insights/api",
    version: Some("2017-10-13"),
    endpoints: &[EndpointDescriptor::rest(
        "profile",
        Method::Post,
        "/v3/profile",
        &[
            Param::query("raw_scores"),
            Param::query("csv_headers"),
            Param::query("consumption_preferences"),
            Param::header("Content-Language"),
            Param::header("Accept-Language"),
        ],
    )
    .with_body(BodyKind::Json, true)],
};

// Language Translator

pub static LANGUAGE_TRANSLATOR: ServiceDefinition = ServiceDefinition {
    name: "language-translator",
    default_url: "https://gateway.watsonplatform.net/language-translator/api",
    version: Some("2018-05-01"),
    endpoints: &[
        EndpointDescriptor::rest("translate", Method::Post, "/v3/translate", &[])
            .with_body(BodyKind::Json, true),
        EndpointDescriptor::rest("identify", Method::Post, "/v3/identify", &[])
            .with_body(BodyKind::Raw, true),
        EndpointDescriptor::rest(
            "list_identifiable_languages",
            Method::Get,
            "/v3/identifiable_languages",
            &[],
        ),
        EndpointDescriptor::rest(
            "list_models",
            Method::Get,
            "/v3/models",
            &[
                Param::query("source"),
                Param::query("target"),
                Param::query("default"),
            ],
        ),
    ],
};

// Compare and Comply

pub static COMPARE_COMPLY: ServiceDefinition = ServiceDefinition {
    name: "compare-comply",
    default_url: "https://gateway.watsonplatform.net/compare-comply/api",
    version: Some("2018-10-15"),
    endpoints: &[
        EndpointDescriptor::rest(
            "convert_to_html",
            Method::Post,
            "/v1/html_conversion",
            &[Param::required_form("file"), Param::query("model")],
        )
        .with_body(BodyKind::Multipart, true),
        EndpointDescriptor::rest(
            "classify_elements",
            Method::Post,
            "/v1/element_classification",
            &[Param::required_form("file"), Param::query("model")],
        )
        .with_body(BodyKind::Multipart, true),
        EndpointDescriptor::rest(
            "compare_documents",
            Method::Post,
            "/v1/comparison",
            &[
                Param::required_form("file_1"),
                Param::required_form("file_2"),
                Param::query("file_1_label"),
                Param::query("file_2_label"),
                Param::query("model"),
            ],
        )
        .with_body(BodyKind::Multipart, true),
        EndpointDescriptor::rest("list_batches", Method::Get, "/v1/batches", &[]),
        EndpointDescriptor::rest(
            "create_batch",
            Method::Post,
            "/v1/batches",
            &[
                Param::required_query("function"),
                Param::required_form("input_credentials_file"),
                Param::required_form("input_bucket_location"),
                Param::required_form("input_bucket_name"),
                Param::required_form("output_credentials_file"),
                Param::required_form("output_bucket_location"),
                Param::required_form("output_bucket_name"),
                Param::query("model"),
            ],
        )
        .with_body(BodyKind::Multipart, true),
        EndpointDescriptor::rest(
            "get_batch",
            Method::Get,
            "/v1/batches/{batch_id}",
            &[Param::path("batch_id")],
        ),
    ],
};
