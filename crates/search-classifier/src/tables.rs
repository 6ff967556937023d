use search_core::Category;

type Table = (Category, &'static [&'static str], Vec<&'static str>, Vec<&'static str>);

/// Default pattern/booster/engine-group tables, ported from the
/// `PATTERNS`, `BOOSTERS`, and `ENGINE_GROUPS` dictionaries in
/// `query_router.py`.
pub(crate) fn default_tables() -> Vec<Table> {
    vec![
        (
            Category::Academic,
            &[
                r"\b(arxiv|journal|citation|doi|peer.review)\b",
                r"\b(research\s+paper|academic\s+study|scholarly)\b",
            ],
            vec!["paper", "study", "scholar"],
            vec!["arxiv", "semantic_scholar", "openalex", "pubmed", "crossref"],
        ),
        (
            Category::Technical,
            &[
                r"\b(api|sdk|documentation|framework|library)\b",
                r"\b(config|configuration|install(ation)?|setup)\b",
                r"\b(tutorial|how\s+to|guide)\b",
            ],
            vec!["docs", "reference"],
            vec!["stackoverflow", "github", "brave", "bing"],
        ),
        (
            Category::Code,
            &[
                r"\b(function|class|variable|compile|syntax)\b",
                r"\b(python|rust|javascript|typescript|java|c\+\+|golang)\b",
                r"\b(npm|pip|pypi|cargo|pip\s+install)\b",
                r"```",
            ],
            vec!["programming", "snippet"],
            vec!["github", "stackoverflow", "brave"],
        ),
        (
            Category::Troubleshooting,
            &[
                r"\b(error|exception|bug|crash|fail(ed|ure)?|broken|not\s+working)\b",
                r"(fault|alarm|error)\s*(code|number|message)",
                r"(SRVO|MOTN|SYST|INTP|PROG|MANU|TOOL|HOST)-\d+",
            ],
            vec!["troubleshoot", "fix", "issue"],
            vec!["reddit", "stackoverflow", "brave", "bing", "superuser"],
        ),
        (
            Category::Industrial,
            &[
                r"\b(plc|hmi|scada|dcs|cnc|robot)\b",
                r"\b(fanuc|siemens|rockwell|allen-bradley|abb|kuka)\b",
                r"(SRVO|MOTN|SYST|INTP|PROG|MANU|TOOL|HOST)-\d+",
            ],
            vec!["industrial", "automation", "vendor"],
            vec!["brave", "bing"],
        ),
        (
            Category::Medical,
            &[
                r"\b(symptom|diagnosis|treatment|disease|patient|medication|dosage)\b",
                r"\b(doctor|clinical|therapy)\b",
            ],
            vec!["health", "medicine"],
            vec!["pubmed", "brave", "bing"],
        ),
        (
            Category::News,
            &[
                r"\b(breaking|news|today|latest|announced)\b",
                r"\b(20\d{2})\b",
            ],
            vec!["headline", "report"],
            vec!["brave", "bing", "reddit"],
        ),
        (
            Category::General,
            &[],
            vec![],
            vec!["brave", "bing", "duckduckgo"],
        ),
    ]
}
