use thiserror::Error;

/// Errores de las fuentes de datos externas
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("error de red: {0}")]
    Network(#[from] reqwest::Error),

    #[error("cuota de API excedida")]
    QuotaExceeded,

    #[error("la API respondió {status}: {body}")]
    Status { status: u16, body: String },

    #[error("respuesta malformada: {0}")]
    Malformed(String),
}
