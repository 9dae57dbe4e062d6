use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::LazyLock;

/// Lines containing one of these open the body of a sectioned ticket.
const SECTION_START_KEYWORDS: &[&str] = &["留言内容", "举报记录描述", "反映内容", "内容"];

/// Intake boilerplate removed from sectioned ticket bodies.
const SECTION_BOILERPLATE: &[&str] = &[
    "（税务机关联系时可附举报资料）",
    "（联系电话可以告知税务机关）",
    "（不能将联系方式告知稽查局）",
    "此工单为实名举报",
    "此工单为匿名举报",
    "举报人来电反映",
    "纳税人来电反映",
    "举报人反映",
    "纳税人反映",
    "举报人来电",
    "纳税人来电",
    "此工单无附件",
    "此工单有附件",
    "不需要回复",
    "需要回复",
];

static SECTION_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*?)(留言内容|举报记录描述|反映内容|意见建议|内容)[:：]")
        .expect("section label pattern is valid")
});

static NEXT_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.{1,100}[:：]").expect("header pattern is valid"));

static CLOSING_PHRASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(对此来电|希望税务).*").expect("closing pattern is valid"));

static CALLER_PREAMBLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.*?来电反映").expect("preamble pattern is valid"));

static REQUEST_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"请处理.*$").expect("request tail pattern is valid"));

/// How cleaned text is produced from a raw record.
///
/// A closed set: each source system's export layout maps to one variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionStrategy {
    /// Text is already clean.
    #[default]
    Passthrough,
    /// Multi-line form export: keep the body section, drop boilerplate.
    SectionBody,
    /// Single-line call note: drop the caller preamble and the request tail.
    CallTranscript,
}

impl ExtractionStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Passthrough => "passthrough",
            Self::SectionBody => "section-body",
            Self::CallTranscript => "call-transcript",
        }
    }

    pub fn extract(&self, raw: &str) -> String {
        match self {
            Self::Passthrough => raw.to_string(),
            Self::SectionBody => extract_section_body(raw),
            Self::CallTranscript => extract_call_transcript(raw),
        }
    }
}

impl FromStr for ExtractionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "passthrough" => Ok(Self::Passthrough),
            "section-body" => Ok(Self::SectionBody),
            "call-transcript" => Ok(Self::CallTranscript),
            other => Err(format!(
                "unknown extraction strategy '{other}' (expected passthrough, section-body or call-transcript)"
            )),
        }
    }
}

fn extract_section_body(raw: &str) -> String {
    let mut body: Vec<String> = Vec::new();
    let mut recording = false;

    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !recording {
            if SECTION_START_KEYWORDS.iter().any(|kw| line.contains(kw)) {
                recording = true;
                let rest = SECTION_LABEL.replace(line, "");
                let rest = rest.trim();
                if !rest.is_empty() {
                    body.push(rest.to_string());
                }
            }
            continue;
        }

        if NEXT_HEADER.is_match(line) {
            break;
        }
        body.push(line.to_string());
    }

    let mut text = body.join("\n");
    for phrase in SECTION_BOILERPLATE {
        text = text.replace(phrase, "");
    }
    CLOSING_PHRASE.replace_all(&text, "").into_owned()
}

fn extract_call_transcript(raw: &str) -> String {
    let text = CALLER_PREAMBLE.replace(raw, "");
    let text = REQUEST_TAIL.replace(&text, "");
    text.trim().to_string()
}
