//! Interface de linha de comando do pixelforge baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, status, sheet)
//! e flags globais (--url, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// pixelforge: geração em lote de assets pixel-art via motor local.
#[derive(Debug, Parser)]
#[command(name = "pixelforge", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// URL base do motor de geração (substitui o arquivo de configuração).
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Renderiza todos os prompts que ainda não têm asset salvo.
    Run {
        /// Arquivo de prompts, um por linha.
        #[arg(long)]
        prompts: Option<PathBuf>,

        /// Diretório onde os assets são salvos.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Salva a imagem do motor sem o pós-processamento pixel-art.
        #[arg(long, default_value_t = false)]
        raw: bool,

        /// Gera a sprite sheet ao final da execução.
        #[arg(long, default_value_t = false)]
        sheet: bool,
    },

    /// Mostra quantos prompts estão prontos e quantos faltam, sem contatar o motor.
    Status {
        /// Arquivo de prompts, um por linha.
        #[arg(long)]
        prompts: Option<PathBuf>,

        /// Diretório onde os assets são salvos.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Monta a sprite sheet a partir dos assets já salvos.
    Sheet {
        /// Diretório onde os assets são salvos.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}
