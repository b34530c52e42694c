use learned_core::Clock;
use learned_core::model::PageId;

/// Settings fixed for the lifetime of one `ProgressSession`.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub page: PageId,
    pub clock: Clock,
}

impl SessionConfig {
    #[must_use]
    pub fn new(page: PageId) -> Self {
        Self {
            page,
            clock: Clock::default(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}
