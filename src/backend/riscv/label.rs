//! Local label generation

/// Hands out `.L1`, `.L2`, ... for one compilation
#[derive(Debug)]
pub struct LabelGenerator {
    next: usize,
}

impl LabelGenerator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn create(&mut self) -> String {
        let label = format!(".L{}", self.next);
        self.next += 1;
        label
    }
}

impl Default for LabelGenerator {
    fn default() -> Self {
        Self::new()
    }
}
