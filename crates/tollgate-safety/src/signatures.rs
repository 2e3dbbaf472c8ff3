//! Threat signature table.
//!
//! Patterns are matched case-insensitively against text that has already
//! had zero-width and control characters removed, so word gaps use `\s*`
//! rather than `\s+`: "ignore\u{200B}all" arrives as "ignoreall".
//! New signatures are added by appending rows.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatCategory {
    InstructionOverride,
    DelimiterInjection,
    PersonaSwitch,
    PromptExtraction,
    CodeExecution,
    BrowserExfiltration,
}

impl ThreatCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatCategory::InstructionOverride => "instruction_override",
            ThreatCategory::DelimiterInjection => "delimiter_injection",
            ThreatCategory::PersonaSwitch => "persona_switch",
            ThreatCategory::PromptExtraction => "prompt_extraction",
            ThreatCategory::CodeExecution => "code_execution",
            ThreatCategory::BrowserExfiltration => "browser_exfiltration",
        }
    }
}

use ThreatCategory::*;

/// Ordered detector table. Earlier rows are tried first.
pub const SIGNATURES: &[(ThreatCategory, &str)] = &[
    // Instruction override
    (
        InstructionOverride,
        r"(ignore|disregard|forget|override|bypass|skip)\s*(all\s*)?(of\s*)?(the\s*|your\s*|any\s*|these\s*)?(previous|prior|above|earlier|preceding|initial|original|system)\s*(instructions?|prompts?|rules|directions|directives|guidelines|context)",
    ),
    (
        InstructionOverride,
        r"(ignore|disregard|forget)\s*(everything|all)\s*(you\s*(were|have\s*been)\s*told|above|before|so\s*far)",
    ),
    (
        InstructionOverride,
        r"\bdo\s*not\s*follow\s*(your|the|any)\s*(rules|instructions|guidelines)",
    ),
    (InstructionOverride, r"\bnew\s*(system\s*)?instructions?\s*:"),
    // Fake delimiters and role markers
    (
        DelimiterInjection,
        r"<\|?\s*/?\s*(im_start|im_end|system|endoftext|assistant)\s*\|?>",
    ),
    (DelimiterInjection, r"\[/?\s*(system|inst|sys)\s*\]"),
    (DelimiterInjection, r"<<\s*/?\s*sys\s*>>"),
    (DelimiterInjection, r"(^|\n)\s*#{2,}\s*(system|instruction)"),
    (DelimiterInjection, r"(^|\n)\s*(system|developer)\s*:"),
    // Persona switch
    (PersonaSwitch, r"\byou\s*are\s*now\b"),
    (
        PersonaSwitch,
        r"\bfrom\s*now\s*on,?\s*(you\s*(are|will|must|shall)|act|respond)",
    ),
    (
        PersonaSwitch,
        r"\b(pretend|imagine)\s*(to\s*be|you\s*are|you're|that\s*you\s*are)",
    ),
    (PersonaSwitch, r"\brole[\s-]*play\s*as\b"),
    (
        PersonaSwitch,
        r"\b(dan|developer|jailbreak|god|unrestricted)\s*mode\b",
    ),
    (PersonaSwitch, r"\bjailbr(ea|o)k"),
    // Prompt extraction
    (
        PromptExtraction,
        r"\b(reveal|show|print|display|repeat|output|leak|dump|tell\s*me|give\s*me)\s*(me\s*)?(your|the)\s*(full\s*|entire\s*|exact\s*)?(system\s*prompt|initial\s*prompt|hidden\s*(prompt|instructions)|(original|initial|secret|hidden)\s*instructions|instructions)",
    ),
    (PromptExtraction, r"system\s*prompt"),
    (
        PromptExtraction,
        r"\b(repeat|print|output)\s*(everything|all|the\s*text)\s*(above|before)",
    ),
    (
        PromptExtraction,
        r"\bwhat\s*(were|are)\s*you\s*told\s*(before|initially|to\s*do)",
    ),
    // Code execution
    (
        CodeExecution,
        r"\b(exec|eval|popen|spawn|os\.system|subprocess\.\w+)\s*\(",
    ),
    (
        CodeExecution,
        r"\b(run|execute)\s*(this|the\s*following)\s*(code|command|script|shell|snippet)",
    ),
    (CodeExecution, r"\brm\s*-rf\b|\bsudo\s|__import__|\bimport\s*subprocess"),
    (CodeExecution, r"\b(curl|wget)\s+https?://"),
    // Browser / DOM exfiltration
    (
        BrowserExfiltration,
        r"\bdocument\s*\.\s*(cookie|domain|location|write)",
    ),
    (
        BrowserExfiltration,
        r"\bwindow\s*\.\s*(location|open)|\b(local|session)storage\b",
    ),
    (BrowserExfiltration, r"<\s*(script|iframe|img|svg)\b|javascript\s*:"),
    (
        BrowserExfiltration,
        r"\bfetch\s*\(|xmlhttprequest|navigator\s*\.\s*sendbeacon|\bon(error|load)\s*=",
    ),
    (BrowserExfiltration, r"!\[[^\]]*\]\(\s*https?://"),
];
