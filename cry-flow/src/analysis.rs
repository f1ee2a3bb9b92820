use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::answers::AnsweredQuestion;
use crate::capture::AudioArtifact;

pub const URGENT_LATENCY: Duration = Duration::from_millis(2000);
pub const DETAILED_LATENCY: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    /// Record-and-go path with no questions asked first
    Urgent,
    /// Path preceded by the quiz
    Detailed,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Urgent => "urgent",
            AnalysisKind::Detailed => "detailed",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AnalysisKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "urgent" => Ok(AnalysisKind::Urgent),
            "detailed" => Ok(AnalysisKind::Detailed),
            other => Err(format!("unknown analysis kind: {other}")),
        }
    }
}

/// What a provider concluded about a recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub diagnosis: String,
    /// Percentage, 0 to 100
    pub confidence: u8,
    pub recommendations: Vec<String>,
    pub insights: String,
}

/// One completed recording session, as shown in the history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub kind: AnalysisKind,
    pub diagnosis: String,
    pub confidence: u8,
    pub recommendations: Vec<String>,
    pub insights: String,
    /// Quiz answers that preceded a detailed analysis
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub answers: Vec<AnsweredQuestion>,
}

impl Analysis {
    /// Stamp a finding with a fresh id and the current time
    pub fn from_finding(
        kind: AnalysisKind,
        finding: Finding,
        answers: Vec<AnsweredQuestion>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            kind,
            diagnosis: finding.diagnosis,
            confidence: finding.confidence.min(100),
            recommendations: finding.recommendations,
            insights: finding.insights,
            answers,
        }
    }
}

/// Turns a recording into a finding.
///
/// The shipped providers wait a fixed time and return a canned finding; a real
/// inference backend slots in behind the same trait.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    fn kind(&self) -> AnalysisKind;

    async fn analyze(&self, artifact: &AudioArtifact) -> Finding;
}

async fn simulate(kind: AnalysisKind, latency: Duration, artifact: &AudioArtifact) {
    info!(
        kind = %kind,
        artifact_id = %artifact.id,
        bytes = artifact.len(),
        latency_ms = latency.as_millis() as u64,
        "Simulating cry analysis"
    );
    tokio::time::sleep(latency).await;
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Fast path used by the urgent mode
#[derive(Debug, Clone)]
pub struct UrgentAnalysisProvider {
    latency: Duration,
}

impl UrgentAnalysisProvider {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    pub fn finding() -> Finding {
        Finding {
            diagnosis: "Desconforto/Dor".to_string(),
            confidence: 78,
            recommendations: owned(&[
                "Verifique a fralda do bebê",
                "Observe se há sinais de cólica",
                "Tente acalmar com movimentos suaves",
                "Se persistir, consulte um pediatra",
            ]),
            insights: "O padrão de choro sugere desconforto. Verifique necessidades básicas primeiro. Se o choro for intenso e persistente, procure orientação médica.".to_string(),
        }
    }
}

impl Default for UrgentAnalysisProvider {
    fn default() -> Self {
        Self::new(URGENT_LATENCY)
    }
}

#[async_trait]
impl AnalysisProvider for UrgentAnalysisProvider {
    fn kind(&self) -> AnalysisKind {
        AnalysisKind::Urgent
    }

    async fn analyze(&self, artifact: &AudioArtifact) -> Finding {
        simulate(self.kind(), self.latency, artifact).await;
        Self::finding()
    }
}

/// Path that follows the quiz
#[derive(Debug, Clone)]
pub struct DetailedAnalysisProvider {
    latency: Duration,
}

impl DetailedAnalysisProvider {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    pub fn finding() -> Finding {
        Finding {
            diagnosis: "Fome".to_string(),
            confidence: 85,
            recommendations: owned(&[
                "Ofereça alimentação ao bebê",
                "Verifique se a última mamada foi completa",
                "Observe sinais de saciedade após alimentar",
            ]),
            insights: "Baseado no padrão de choro e nas informações fornecidas, seu bebê provavelmente está com fome. O tempo desde a última alimentação e o padrão sonoro indicam necessidade de nutrição.".to_string(),
        }
    }
}

impl Default for DetailedAnalysisProvider {
    fn default() -> Self {
        Self::new(DETAILED_LATENCY)
    }
}

#[async_trait]
impl AnalysisProvider for DetailedAnalysisProvider {
    fn kind(&self) -> AnalysisKind {
        AnalysisKind::Detailed
    }

    async fn analyze(&self, artifact: &AudioArtifact) -> Finding {
        simulate(self.kind(), self.latency, artifact).await;
        Self::finding()
    }
}

/// Simulated latency of each provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisSettings {
    pub urgent_latency: Duration,
    pub detailed_latency: Duration,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            urgent_latency: URGENT_LATENCY,
            detailed_latency: DETAILED_LATENCY,
        }
    }
}

pub fn provider_for(kind: AnalysisKind, settings: &AnalysisSettings) -> Arc<dyn AnalysisProvider> {
    match kind {
        AnalysisKind::Urgent => Arc::new(UrgentAnalysisProvider::new(settings.urgent_latency)),
        AnalysisKind::Detailed => {
            Arc::new(DetailedAnalysisProvider::new(settings.detailed_latency))
        }
    }
}
