use search_fusion::FusionMethod;

/// Knobs for the orchestrated pipeline.
///
/// `top_k` is the number of results handed back to the caller; fusion
/// keeps roughly `2*top_k` candidates alive through reranking so the
/// cross-encoder (C6, which itself caps at its own `top_k = 20`) has
/// enough margin to reorder before the final truncation.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub top_k: usize,
    pub local_index_limit: usize,
    pub local_boost: f64,
    pub fusion_method: FusionMethod,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            local_index_limit: 5,
            local_boost: 0.5,
            fusion_method: FusionMethod::Hybrid,
        }
    }
}
