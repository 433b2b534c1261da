//! Configuração do pixelforge carregada a partir de `pixelforge.toml`.
//!
//! A struct [`ForgeConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `PIXELFORGE_ENGINE_URL` tem precedência sobre o arquivo.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::catalog::WorkItem;
use crate::engine::Txt2ImgRequest;

/// Nome do arquivo de configuração procurado no diretório atual.
pub const CONFIG_FILE: &str = "pixelforge.toml";

/// Configuração de nível superior carregada de `pixelforge.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ForgeConfig {
    /// URL base do motor de geração.
    #[serde(default = "default_engine_url")]
    pub engine_url: String,

    /// Arquivo de prompts, um por linha.
    #[serde(default = "default_prompts_file")]
    pub prompts_file: PathBuf,

    /// Diretório dos assets finais, nomeados pela chave de conteúdo.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Diretório da sprite sheet e do manifesto.
    #[serde(default = "default_sheet_dir")]
    pub sheet_dir: PathBuf,

    /// Aplica o pós-processamento pixel-art antes de salvar.
    #[serde(default = "default_true")]
    pub process_assets: bool,

    /// Número de cores da paleta final de cada asset.
    #[serde(default = "default_palette_size")]
    pub palette_size: usize,

    /// Gera a sprite sheet ao final de cada execução.
    #[serde(default)]
    pub build_sheet: bool,

    /// Intervalo entre tentativas de conexão na inicialização.
    #[serde(default = "default_health_interval_ms")]
    pub health_interval_ms: u64,

    /// Intervalo de amostragem do progresso durante a renderização.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Espera adicional após um item falhar.
    #[serde(default = "default_error_penalty_ms")]
    pub error_penalty_ms: u64,

    /// Memória da GPU em MB. Quando definida, substitui a detecção via NVML.
    #[serde(default)]
    pub vram_mb: Option<u64>,

    /// Parâmetros fixos enviados ao motor em cada requisição.
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Parâmetros de geração aplicados a todos os itens.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GenerationConfig {
    /// Modelo do prompt; `{prompt}` é substituído pelo texto do item.
    #[serde(default = "default_style_template")]
    pub style_template: String,

    #[serde(default = "default_negative_prompt")]
    pub negative_prompt: String,

    #[serde(default = "default_steps")]
    pub steps: u32,

    #[serde(default = "default_cfg_scale")]
    pub cfg_scale: f32,

    #[serde(default = "default_sampler")]
    pub sampler: String,
}

fn default_engine_url() -> String {
    "http://127.0.0.1:7860".to_string()
}

fn default_prompts_file() -> PathBuf {
    PathBuf::from("prompts.txt")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs/pixelart")
}

fn default_sheet_dir() -> PathBuf {
    PathBuf::from("outputs/sheet")
}

fn default_true() -> bool {
    true
}

fn default_palette_size() -> usize {
    crate::postprocess::PALETTE_SIZE
}

// Valor padrão do intervalo de conexão: 2s.
fn default_health_interval_ms() -> u64 {
    2000
}

// Valor padrão da amostragem de progresso: 1s.
fn default_poll_interval_ms() -> u64 {
    1000
}

// Valor padrão da penalidade após erro: 10s.
fn default_error_penalty_ms() -> u64 {
    10_000
}

fn default_style_template() -> String {
    "pixel art, {prompt}, vibrant colors".to_string()
}

fn default_negative_prompt() -> String {
    "blurry, low quality, photo".to_string()
}

fn default_steps() -> u32 {
    20
}

fn default_cfg_scale() -> f32 {
    7.0
}

fn default_sampler() -> String {
    "Euler a".to_string()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            style_template: default_style_template(),
            negative_prompt: default_negative_prompt(),
            steps: default_steps(),
            cfg_scale: default_cfg_scale(),
            sampler: default_sampler(),
        }
    }
}

impl GenerationConfig {
    /// Monta a requisição `txt2img` para um item, na resolução alvo dele.
    pub fn request_for(&self, item: &WorkItem) -> Txt2ImgRequest {
        Txt2ImgRequest {
            prompt: self.style_template.replace("{prompt}", &item.prompt_text),
            negative_prompt: self.negative_prompt.clone(),
            steps: self.steps,
            width: item.target_resolution,
            height: item.target_resolution,
            cfg_scale: self.cfg_scale,
            sampler_name: self.sampler.clone(),
        }
    }
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            engine_url: default_engine_url(),
            prompts_file: default_prompts_file(),
            output_dir: default_output_dir(),
            sheet_dir: default_sheet_dir(),
            process_assets: true,
            palette_size: default_palette_size(),
            build_sheet: false,
            health_interval_ms: default_health_interval_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            error_penalty_ms: default_error_penalty_ms(),
            vram_mb: None,
            generation: GenerationConfig::default(),
        }
    }
}

impl ForgeConfig {
    /// Carrega a configuração de `pixelforge.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Carrega a configuração de um caminho explícito.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<ForgeConfig>(&contents)?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo para a URL do motor.
        if let Ok(url) = std::env::var("PIXELFORGE_ENGINE_URL")
            && !url.is_empty()
        {
            config.engine_url = url;
        }

        Ok(config)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn error_penalty(&self) -> Duration {
        Duration::from_millis(self.error_penalty_ms)
    }
}
