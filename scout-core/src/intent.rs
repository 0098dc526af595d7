//! Task intent detection
//!
//! Classifies a free-text task into independent flags. Detection is a
//! declarative table of `(flag, phrases, patterns)` rules; each rule is
//! compiled once into a single regex and evaluated uniformly, so a new flag
//! only needs a new table row.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Individual intent flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentFlag {
    Email,
    Phone,
    ProductList,
    TextDump,
    Pdf,
    Images,
    Csv,
    Screenshot,
    Research,
    ComplexTask,
    Navigation,
    StructuredData,
}

/// A detection rule: whole-word phrases plus raw regex patterns
struct IntentRule {
    flag: IntentFlag,
    phrases: &'static [&'static str],
    patterns: &'static [&'static str],
}

const INTENT_RULES: &[IntentRule] = &[
    IntentRule {
        flag: IntentFlag::Email,
        phrases: &[
            "email", "emails", "e-mail", "e-mails", "mail address", "mailto",
            "contact info", "contact information", "contact details",
        ],
        patterns: &[],
    },
    IntentRule {
        flag: IntentFlag::Phone,
        phrases: &[
            "phone", "phones", "telephone", "tel", "mobile number", "cell phone",
            "call us", "whatsapp", "fax", "contact number",
            "contact info", "contact information", "contact details",
        ],
        patterns: &[],
    },
    IntentRule {
        flag: IntentFlag::ProductList,
        phrases: &[
            "product", "products", "listing", "listings", "catalog", "catalogue",
            "items for sale", "merchandise", "shop items", "store items",
        ],
        patterns: &[],
    },
    IntentRule {
        flag: IntentFlag::TextDump,
        phrases: &[
            "text", "article", "page content", "full text", "all the text",
            "transcript", "blog post", "main content",
        ],
        patterns: &[],
    },
    IntentRule {
        flag: IntentFlag::Pdf,
        phrases: &["pdf", "pdfs", ".pdf", "brochure", "whitepaper", "datasheet", "documents"],
        patterns: &[],
    },
    IntentRule {
        flag: IntentFlag::Images,
        phrases: &[
            "image", "images", "photo", "photos", "picture", "pictures",
            "jpg", "jpeg", "png", "gallery",
        ],
        patterns: &[],
    },
    IntentRule {
        flag: IntentFlag::Csv,
        phrases: &["csv", "spreadsheet", "spreadsheets", "excel", "xlsx"],
        patterns: &[],
    },
    IntentRule {
        flag: IntentFlag::Screenshot,
        phrases: &["screenshot", "screen shot", "screen capture", "capture the page"],
        patterns: &[],
    },
    IntentRule {
        flag: IntentFlag::Research,
        phrases: &[
            "research", "in detail", "detailed", "analyze", "analyse", "analysis",
            "compare", "comparison", "summarize", "summarise", "summary", "overview",
            "tell me about", "investigate", "explain", "insights",
        ],
        patterns: &[],
    },
    IntentRule {
        flag: IntentFlag::ComplexTask,
        phrases: &["then", "after that", "afterwards", "followed by", "once you", "step by step"],
        patterns: &[
            // first ... then
            r"\bfirst\b.*\bthen\b",
            // after ... do/get/find
            r"\bafter\b.+\b(do|get|find|extract|collect|open|visit)\b",
            // two or more commas
            r",[^,]*,",
            // enumerated steps
            r"(^|\s)(\d+[.)]|step\s+\d+:?)\s",
        ],
    },
    IntentRule {
        flag: IntentFlag::Navigation,
        phrases: &[
            "next page", "previous page", "pagination", "paginate", "click", "navigate",
            "go to", "follow the link", "follow links", "all pages", "every page",
            "load more", "scroll",
        ],
        patterns: &[r"\bpages?\s+\d+\b"],
    },
    IntentRule {
        flag: IntentFlag::StructuredData,
        phrases: &[
            "with their", "along with", "and their", "for each", "each with",
            "table of", "as json", "as a table", "structured",
        ],
        patterns: &[
            r"\b\d+\s+(products|items|quotes|articles|posts|books|jobs|listings|reviews|results|entries)\b",
            r"\bquotes\b.*\bauthors?\b",
        ],
    },
];

/// Compile one rule into an alternation; phrases match on word boundaries
/// where their edge characters are word characters.
fn compile_rule(rule: &IntentRule) -> Regex {
    let mut parts: Vec<String> = rule
        .phrases
        .iter()
        .map(|phrase| {
            let starts_word = phrase.chars().next().is_some_and(|c| c.is_alphanumeric());
            let ends_word = phrase.chars().last().is_some_and(|c| c.is_alphanumeric());
            format!(
                "{}{}{}",
                if starts_word { r"\b" } else { "" },
                regex::escape(phrase),
                if ends_word { r"\b" } else { "" },
            )
        })
        .collect();
    parts.extend(rule.patterns.iter().map(|p| format!("(?:{})", p)));
    Regex::new(&parts.join("|")).unwrap()
}

static COMPILED_RULES: LazyLock<Vec<(IntentFlag, Regex)>> = LazyLock::new(|| {
    INTENT_RULES
        .iter()
        .map(|rule| (rule.flag, compile_rule(rule)))
        .collect()
});

static QUESTION_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(what|who|whom|whose|how|why|when|where|which|is|are|does|do|did|can|could|should|would|will)\b").unwrap()
});

/// Classification of a task string
///
/// Flags are independent; `is_general` is set only when no content-type or
/// complexity flag fired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskIntent {
    pub wants_email: bool,
    pub wants_phone: bool,
    pub wants_product_list: bool,
    pub wants_text_dump: bool,
    pub wants_pdf: bool,
    pub wants_images: bool,
    pub wants_csv: bool,
    pub wants_screenshot: bool,
    pub is_research: bool,
    pub is_general: bool,
    pub is_complex_task: bool,
    pub requires_navigation: bool,
    pub wants_structured_data: bool,
}

impl TaskIntent {
    fn set(&mut self, flag: IntentFlag) {
        match flag {
            IntentFlag::Email => self.wants_email = true,
            IntentFlag::Phone => self.wants_phone = true,
            IntentFlag::ProductList => self.wants_product_list = true,
            IntentFlag::TextDump => self.wants_text_dump = true,
            IntentFlag::Pdf => self.wants_pdf = true,
            IntentFlag::Images => self.wants_images = true,
            IntentFlag::Csv => self.wants_csv = true,
            IntentFlag::Screenshot => self.wants_screenshot = true,
            IntentFlag::Research => self.is_research = true,
            IntentFlag::ComplexTask => self.is_complex_task = true,
            IntentFlag::Navigation => self.requires_navigation = true,
            IntentFlag::StructuredData => self.wants_structured_data = true,
        }
    }

    pub fn has(&self, flag: IntentFlag) -> bool {
        match flag {
            IntentFlag::Email => self.wants_email,
            IntentFlag::Phone => self.wants_phone,
            IntentFlag::ProductList => self.wants_product_list,
            IntentFlag::TextDump => self.wants_text_dump,
            IntentFlag::Pdf => self.wants_pdf,
            IntentFlag::Images => self.wants_images,
            IntentFlag::Csv => self.wants_csv,
            IntentFlag::Screenshot => self.wants_screenshot,
            IntentFlag::Research => self.is_research,
            IntentFlag::ComplexTask => self.is_complex_task,
            IntentFlag::Navigation => self.requires_navigation,
            IntentFlag::StructuredData => self.wants_structured_data,
        }
    }

    /// Task wants files rather than page data
    pub fn wants_download(&self) -> bool {
        self.wants_pdf || self.wants_images || self.wants_csv
    }

    /// Contact data (email or phone) requested
    pub fn wants_contact(&self) -> bool {
        self.wants_email || self.wants_phone
    }

    /// Tasks that always need LLM synthesis, even when data was found
    pub fn needs_synthesis(&self) -> bool {
        self.is_complex_task || self.requires_navigation || self.wants_structured_data || self.is_research
    }
}

/// Classify a task; pure keyword/pattern membership over the lowercased text
pub fn detect_intent(task: &str) -> TaskIntent {
    let normalized = task.trim().to_lowercase();
    let mut intent = TaskIntent::default();

    for (flag, regex) in COMPILED_RULES.iter() {
        if regex.is_match(&normalized) {
            intent.set(*flag);
        }
    }

    intent.is_general = !COMPILED_RULES.iter().any(|(flag, _)| intent.has(*flag));
    intent
}

/// Whether the task is phrased as a question
pub fn is_question(task: &str) -> bool {
    let normalized = task.trim().to_lowercase();
    normalized.ends_with('?') || QUESTION_START.is_match(&normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_rules_compile() {
        assert_eq!(COMPILED_RULES.len(), INTENT_RULES.len());
    }

    #[test]
    fn test_contact_email_and_phone() {
        let intent = detect_intent("Find the contact email and phone number");
        assert!(intent.wants_email);
        assert!(intent.wants_phone);
        assert!(!intent.is_complex_task);
        assert!(!intent.is_general);
    }

    #[test]
    fn test_plain_contact_email_is_not_phone() {
        let intent = detect_intent("find the contact email");
        assert!(intent.wants_email);
        assert!(!intent.wants_phone);
        assert!(!intent.needs_synthesis());
    }

    #[test]
    fn test_sequencing_is_complex() {
        let intent = detect_intent("First get the product list, then email me a summary");
        assert!(intent.is_complex_task);
        assert!(intent.wants_product_list);
        assert!(intent.needs_synthesis());
    }

    #[test]
    fn test_email_synonyms() {
        assert!(detect_intent("grab the E-Mail").wants_email);
        assert!(detect_intent("list every mailto link").wants_email);
        assert!(detect_intent("contact details please").wants_phone);
    }

    #[test]
    fn test_tel_does_not_match_tell() {
        let intent = detect_intent("tell me about this company");
        assert!(!intent.wants_phone);
        assert!(intent.is_research);
    }

    #[test]
    fn test_multi_clause_and_enumerated() {
        assert!(detect_intent("open the shop, find shoes, list sizes").is_complex_task);
        assert!(detect_intent("1. open the blog 2. read the latest post").is_complex_task);
    }

    #[test]
    fn test_navigation_and_structured() {
        let intent = detect_intent("Get quotes with their authors from page 2");
        assert!(intent.requires_navigation);
        assert!(intent.wants_structured_data);

        assert!(detect_intent("give me 10 products").wants_structured_data);
        assert!(detect_intent("click the next page").requires_navigation);
    }

    #[test]
    fn test_general_is_complement() {
        let intent = detect_intent("What does this company do?");
        assert!(intent.is_general);
        assert!(is_question("What does this company do?"));

        let intent = detect_intent("download the pdf files");
        assert!(intent.wants_pdf);
        assert!(intent.wants_download());
        assert!(!intent.is_general);
    }

    #[test]
    fn test_screenshot() {
        let intent = detect_intent("Take a screenshot of the homepage");
        assert!(intent.wants_screenshot);
        assert!(!is_question("Take a screenshot of the homepage"));
    }
}
