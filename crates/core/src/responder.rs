use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::models::{InquiryCategory, InquiryPriority, ReplyTemplate};

pub const DEFAULT_AUTO_REPLY_THRESHOLD: f32 = 0.6;

// `$` stands alone so "$500" reads as a currency sign plus an amount.
static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$|[a-z0-9]+(?:'[a-z]+)?").expect("token regex"));

struct KeywordSet {
    category: InquiryCategory,
    words: &'static [&'static str],
    phrases: &'static [&'static str],
}

// Order matters: ties go to the earlier set.
const KEYWORD_SETS: [KeywordSet; 4] = [
    KeywordSet {
        category: InquiryCategory::Booking,
        words: &[
            "book",
            "booking",
            "reserve",
            "reservation",
            "availability",
            "available",
            "schedule",
            "date",
            "dates",
            "spot",
            "spots",
            "seat",
            "seats",
        ],
        phrases: &["sign up", "join the tour"],
    },
    KeywordSet {
        category: InquiryCategory::Pricing,
        words: &[
            "price", "prices", "pricing", "cost", "costs", "fee", "fees", "payment", "pay",
            "money", "expensive", "cheap", "discount", "deposit", "total", "amount", "usd",
            "dollar", "dollars", "$",
        ],
        phrases: &["how much"],
    },
    KeywordSet {
        category: InquiryCategory::Cancellation,
        words: &[
            "cancel",
            "cancelled",
            "cancellation",
            "refund",
            "refunds",
            "change",
            "modify",
            "reschedule",
            "policy",
            "terms",
            "conditions",
        ],
        phrases: &["money back"],
    },
    KeywordSet {
        category: InquiryCategory::General,
        words: &[
            "where",
            "location",
            "destination",
            "weather",
            "group",
            "guide",
            "transport",
            "hotel",
            "accommodation",
            "equipment",
            "pickup",
            "duration",
            "hours",
            "days",
        ],
        phrases: &["how long", "what to bring", "best time"],
    },
];

pub const ESCALATION_KEYWORDS: [&str; 12] = [
    "complaint",
    "angry",
    "problem",
    "issue",
    "disappointed",
    "terrible",
    "awful",
    "frustrated",
    "urgent",
    "emergency",
    "lawyer",
    "unacceptable",
];

const URGENT_KEYWORDS: [&str; 2] = ["urgent", "emergency"];

pub fn tokenize(input: &str) -> Vec<String> {
    let lower = input.to_lowercase();
    TOKEN
        .find_iter(&lower)
        .map(|token| token.as_str().to_string())
        .collect()
}

/// The part of a token before any apostrophe: "lawyer's" becomes "lawyer".
fn word_root(token: &str) -> &str {
    token.split('\'').next().unwrap_or(token)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryScore {
    pub category: InquiryCategory,
    pub hits: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InquiryAnalysis {
    pub category: InquiryCategory,
    pub confidence: f32,
    pub word_count: usize,
    pub scores: Vec<CategoryScore>,
    pub escalation_keywords: Vec<String>,
}

impl InquiryAnalysis {
    pub fn escalated(&self) -> bool {
        !self.escalation_keywords.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponderDecision {
    pub analysis: InquiryAnalysis,
    pub reply: Option<String>,
    /// Set when a stored reply template produced `reply`.
    pub template_id: Option<String>,
    pub requires_human_review: bool,
    pub priority: InquiryPriority,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct AutoResponder {
    threshold: f32,
}

impl Default for AutoResponder {
    fn default() -> Self {
        Self::new(DEFAULT_AUTO_REPLY_THRESHOLD)
    }
}

impl AutoResponder {
    pub fn new(threshold: f32) -> Self {
        let threshold = if threshold.is_finite() {
            threshold.clamp(0.0, 1.0)
        } else {
            DEFAULT_AUTO_REPLY_THRESHOLD
        };
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn analyze(&self, subject: &str, message: &str) -> InquiryAnalysis {
        let tokens = tokenize(&format!("{subject} {message}"));
        let joined = format!(" {} ", tokens.join(" "));

        let scores: Vec<CategoryScore> = KEYWORD_SETS
            .iter()
            .map(|set| {
                let word_hits = tokens
                    .iter()
                    .filter(|token| set.words.contains(&word_root(token)))
                    .count();
                let phrase_hits = set
                    .phrases
                    .iter()
                    .filter(|phrase| joined.contains(&format!(" {phrase} ")))
                    .count();
                CategoryScore {
                    category: set.category,
                    hits: word_hits + phrase_hits,
                }
            })
            .collect();

        let mut best: Option<&CategoryScore> = None;
        for score in scores.iter().filter(|score| score.hits > 0) {
            if best.map_or(true, |current| score.hits > current.hits) {
                best = Some(score);
            }
        }

        let word_count = tokens.len();
        let (category, confidence) = match best {
            Some(score) => {
                let scale = (word_count as f32 / 10.0).max(1.0);
                (score.category, (score.hits as f32 / scale).min(1.0))
            }
            None => (InquiryCategory::General, 0.0),
        };

        let mut escalation_keywords: Vec<String> = Vec::new();
        for token in &tokens {
            let root = word_root(token);
            let stem = root.strip_suffix('s').unwrap_or(root);
            let hit = ESCALATION_KEYWORDS
                .iter()
                .find(|keyword| **keyword == root || **keyword == stem);
            if let Some(keyword) = hit {
                if !escalation_keywords.iter().any(|seen| seen == keyword) {
                    escalation_keywords.push((*keyword).to_string());
                }
            }
        }

        InquiryAnalysis {
            category,
            confidence,
            word_count,
            scores,
            escalation_keywords,
        }
    }

    /// Decides with the built-in replies only.
    pub fn decide(&self, name: &str, subject: &str, message: &str) -> ResponderDecision {
        self.decide_with_templates(name, "", subject, message, &[])
    }

    /// Active templates for the classified category answer first when their
    /// trigger keywords match and the confidence clears their own threshold.
    /// Without a matching template the built-in reply and the responder
    /// threshold apply. Escalation keywords always block the auto-reply.
    pub fn decide_with_templates(
        &self,
        name: &str,
        email: &str,
        subject: &str,
        message: &str,
        templates: &[ReplyTemplate],
    ) -> ResponderDecision {
        let analysis = self.analyze(subject, message);
        let mut reasons = Vec::new();

        if analysis.escalated() {
            reasons.push(format!(
                "escalation keywords: {}",
                analysis.escalation_keywords.join(", ")
            ));
        }

        let tokens = tokenize(&format!("{subject} {message}"));
        let candidates: Vec<&ReplyTemplate> = templates
            .iter()
            .filter(|template| template.is_active && template.category == analysis.category)
            .filter(|template| triggers_match(template, &tokens))
            .collect();

        let mut chosen = None;
        if candidates.is_empty() {
            if analysis.confidence < self.threshold {
                reasons.push(format!(
                    "low confidence {:.2} below threshold {:.2}",
                    analysis.confidence, self.threshold
                ));
            }
        } else {
            chosen = candidates
                .iter()
                .find(|template| analysis.confidence >= template.confidence_threshold)
                .copied();
            if chosen.is_none() {
                let lowest = candidates
                    .iter()
                    .map(|template| template.confidence_threshold)
                    .fold(f32::INFINITY, f32::min);
                reasons.push(format!(
                    "low confidence {:.2} below template threshold {:.2}",
                    analysis.confidence, lowest
                ));
            }
        }

        let (reply, template_id) = if reasons.is_empty() {
            match chosen {
                Some(template) => (
                    Some(render_template(&template.body, name, email)),
                    Some(template.template_id.clone()),
                ),
                None => (Some(canned_reply(analysis.category, name)), None),
            }
        } else {
            (None, None)
        };

        ResponderDecision {
            requires_human_review: reply.is_none(),
            priority: priority_for(&analysis),
            analysis,
            reply,
            template_id,
            reasons,
        }
    }
}

/// Empty trigger lists match everything; multi-word triggers match as phrases.
fn triggers_match(template: &ReplyTemplate, tokens: &[String]) -> bool {
    if template.trigger_keywords.is_empty() {
        return true;
    }
    let joined = format!(" {} ", tokens.join(" "));
    template.trigger_keywords.iter().any(|keyword| {
        let keyword = keyword.trim().to_lowercase();
        if keyword.contains(' ') {
            joined.contains(&format!(" {keyword} "))
        } else {
            tokens
                .iter()
                .any(|token| token == &keyword || word_root(token) == keyword)
        }
    })
}

fn priority_for(analysis: &InquiryAnalysis) -> InquiryPriority {
    let urgent = analysis
        .escalation_keywords
        .iter()
        .any(|keyword| URGENT_KEYWORDS.contains(&keyword.as_str()));
    if urgent {
        InquiryPriority::Urgent
    } else if analysis.escalated() {
        InquiryPriority::High
    } else {
        InquiryPriority::Medium
    }
}

/// Fills `{name}` and `{email}` (or `{user_name}` and `{user_email}`).
pub fn render_template(body: &str, name: &str, email: &str) -> String {
    body.replace("{user_name}", name.trim())
        .replace("{name}", name.trim())
        .replace("{user_email}", email.trim())
        .replace("{email}", email.trim())
}

pub fn canned_reply(category: InquiryCategory, name: &str) -> String {
    let template = match category {
        InquiryCategory::Booking => {
            "Hello {name},\n\nThanks for your interest in travelling with us. You can book any \
             tour directly from its page: pick a travel date inside the tour's availability \
             window and the number of participants (up to 10 per booking). Your booking is held \
             as pending until payment is completed, and you will receive a confirmation email \
             with your booking reference.\n\nThe Wayfare team"
        }
        InquiryCategory::Pricing => {
            "Hello {name},\n\nTour prices are listed per participant on each tour page and the \
             booking total is simply the price multiplied by the number of travellers. Payment \
             is taken by card when you confirm the booking; there are no hidden fees.\n\nThe \
             Wayfare team"
        }
        InquiryCategory::Cancellation => {
            "Hello {name},\n\nYou can cancel a booking from your account up to 7 days before \
             the travel date, and change participants or dates up to 2 days before travel. \
             Refunds for paid bookings are processed back to the original payment method.\n\n\
             The Wayfare team"
        }
        InquiryCategory::General => {
            "Hello {name},\n\nThanks for getting in touch. Each tour page lists the destination, \
             duration, difficulty and group size, and our team is happy to help with anything \
             else you need for your trip.\n\nThe Wayfare team"
        }
    };
    template.replace("{name}", name.trim())
}
