//! Tipos de dados das requisições e respostas do motor (API `sdapi/v1`).
//!
//! Todas as structs derivam `Serialize`/`Deserialize` para conversão JSON
//! conforme o formato esperado pelos endpoints `txt2img` e `progress`.

use serde::{Deserialize, Serialize};

/// Corpo da requisição para `POST /sdapi/v1/txt2img`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Txt2ImgRequest {
    /// Prompt final já com o sufixo de estilo aplicado.
    pub prompt: String,
    pub negative_prompt: String,
    /// Número de passos de amostragem.
    pub steps: u32,
    pub width: u32,
    pub height: u32,
    /// Escala de orientação (guidance).
    pub cfg_scale: f32,
    /// Identificador do amostrador (ex.: "Euler a").
    pub sampler_name: String,
}

/// Resposta de `txt2img`: lista de imagens codificadas em base64.
///
/// Campos extras (`parameters`, `info`) são ignorados.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Txt2ImgResponse {
    #[serde(default)]
    pub images: Vec<String>,
}

/// Resposta de `GET /sdapi/v1/progress`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    /// Fração concluída do item em execução, em `[0, 1]`.
    #[serde(default)]
    pub progress: f64,
    /// Estimativa do próprio motor em segundos. Apenas informativa.
    #[serde(default, rename = "eta_relative")]
    pub eta_hint: f64,
}
