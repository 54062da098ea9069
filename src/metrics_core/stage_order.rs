//! Pipeline stage ordering policy with tie-break priorities

use std::collections::HashMap;

/// Injectable ordering policy over pipeline stage names.
///
/// Two lookup tables drive the comparison: a stage order (higher is more
/// advanced, unknown stages rank 0) and a tie-break priority for stages that
/// share an order value (smaller wins, unlisted stages always lose ties).
/// The terminal discard stage overrides ordering entirely: reaching it is
/// informative even though its configured order is not the highest.
pub struct StageOrdering {
    order: HashMap<String, u32>,
    priority: HashMap<String, u32>,
    terminal_discard: String,
}

impl StageOrdering {
    pub fn new(
        order: HashMap<String, u32>,
        priority: HashMap<String, u32>,
        terminal_discard: impl Into<String>,
    ) -> Self {
        Self {
            order,
            priority,
            terminal_discard: terminal_discard.into(),
        }
    }

    pub fn order_of(&self, stage: &str) -> u32 {
        self.order.get(stage).copied().unwrap_or(0)
    }

    fn priority_of(&self, stage: &str) -> u32 {
        self.priority.get(stage).copied().unwrap_or(u32::MAX)
    }

    pub fn terminal_discard(&self) -> &str {
        &self.terminal_discard
    }

    /// Decide whether `candidate` beats the `incumbent` stage.
    ///
    /// 1. The terminal discard stage always wins as a candidate.
    /// 2. Higher order wins.
    /// 3. Equal order resolved by lower tie-break priority.
    pub fn is_more_advanced(&self, candidate: &str, incumbent: &str) -> bool {
        if candidate == self.terminal_discard {
            return true;
        }
        let candidate_order = self.order_of(candidate);
        let incumbent_order = self.order_of(incumbent);
        if candidate_order != incumbent_order {
            return candidate_order > incumbent_order;
        }
        self.priority_of(candidate) < self.priority_of(incumbent)
    }

    /// Fold an iterator of stage names down to the single most advanced one.
    pub fn most_advanced<'a, I>(&self, stages: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut best: Option<&'a str> = None;
        for stage in stages {
            best = match best {
                None => Some(stage),
                Some(incumbent) if self.is_more_advanced(stage, incumbent) => Some(stage),
                keep => keep,
            };
        }
        best
    }
}

impl Default for StageOrdering {
    /// Production tables observed in the CRM pipeline.
    ///
    /// AGENDADO/LEAD QUENTE and ASSISTÊNCIA/GARANTIA intentionally share an
    /// order value; the priority table breaks those ties.
    fn default() -> Self {
        let order = [
            ("etapa de leads reorganizados", 1),
            ("1° ATENDIMENTO(MANHÃ)", 2),
            ("1º ATENDIMENTO(TARDE)", 3),
            ("2° ATENDIMENTO", 4),
            ("3° ATENDIMENTO", 5),
            ("AGENDADO", 6),
            ("LEAD QUENTE", 6),
            ("ASSISTÊNCIA", 7),
            ("GARANTIA", 7),
            ("LEAD DESCARTADO", 8),
            ("LEAD CONVERTIDO", 9),
        ]
        .into_iter()
        .map(|(name, rank)| (name.to_string(), rank))
        .collect();

        let priority = [
            ("LEAD QUENTE", 1),
            ("AGENDADO", 2),
            ("GARANTIA", 1),
            ("ASSISTÊNCIA", 2),
        ]
        .into_iter()
        .map(|(name, rank)| (name.to_string(), rank))
        .collect();

        Self::new(order, priority, "LEAD DESCARTADO")
    }
}
