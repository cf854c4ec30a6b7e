use serde::Serialize;

/// The six pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    UploadOriginal,
    GeneratePreview,
    UploadPreview,
    PersistProvisional,
    AiAnalyze,
    PersistFinal,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::UploadOriginal,
        Stage::GeneratePreview,
        Stage::UploadPreview,
        Stage::PersistProvisional,
        Stage::AiAnalyze,
        Stage::PersistFinal,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::UploadOriginal => "Uploading resume",
            Stage::GeneratePreview => "Generating preview",
            Stage::UploadPreview => "Uploading preview",
            Stage::PersistProvisional => "Saving data",
            Stage::AiAnalyze => "AI analyzing",
            Stage::PersistFinal => "Finalizing",
        }
    }

    /// Fraction of the pipeline reached once this stage has started.
    pub fn progress(self) -> f32 {
        (self.index() + 1) as f32 / Self::COUNT as f32
    }
}
