//! Tipos de erro para o cliente do motor de geração.
//!
//! Define [`EngineError`] com variantes para erros HTTP, falhas de rede,
//! timeouts e respostas que não contêm uma imagem válida.

use thiserror::Error;

/// Erros que podem ocorrer ao conversar com o motor de geração.
///
/// - [`Api`](EngineError::Api): o motor respondeu com status diferente de 2xx
/// - [`Network`](EngineError::Network): falha na camada de rede
/// - [`Timeout`](EngineError::Timeout): a renderização excedeu o tempo do plano
/// - [`Decode`](EngineError::Decode): a resposta não trouxe uma imagem utilizável
#[derive(Debug, Error)]
pub enum EngineError {
    /// Status HTTP de erro e o corpo da resposta.
    #[error("engine error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Falha de rede subjacente (conexão recusada, DNS, corpo truncado).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// O tempo limite da requisição definido pelo plano de ritmo foi atingido.
    #[error("render timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Payload ausente ou base64 inválido.
    #[error("bad image payload: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn api_error_display() {
        let err = EngineError::Api {
            status: 500,
            message: "Internal Server Error".into(),
        };
        assert_eq!(err.to_string(), "engine error (status 500): Internal Server Error");
    }

    #[test]
    fn timeout_display() {
        let err = EngineError::Timeout(Duration::from_secs(900));
        assert_eq!(err.to_string(), "render timed out after 900s");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EngineError>();
    }
}
