//! Interface de terminal do pixelforge: barra de progresso e saída colorida.
//!
//! Usa `indicatif` para a linha de status sobrescrita durante a renderização
//! e `console` para estilizar as mensagens. O [`BatchProgress`] acompanha
//! visualmente a sessão inteira no terminal.

use std::path::Path;
use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::catalog::WorkItem;
use crate::error::ForgeError;
use crate::pacing::PacingPlan;
use crate::progress::{Estimate, format_eta};
use crate::sheet::SheetManifest;
use crate::state_machine::{ItemRun, ItemState, SessionSummary};

/// Indicador visual de progresso para uma sessão de geração.
///
/// Mostra um spinner enquanto o motor inicializa, uma barra com ETA durante
/// cada renderização e mensagens coloridas para sucesso (verde), falha
/// (vermelho) e avisos (amarelo).
pub struct BatchProgress {
    // Linha de status sobrescrita do indicatif.
    pb: ProgressBar,
    // Estilo da barra durante a renderização.
    bar_style: ProgressStyle,
    // Estilo do spinner de espera.
    spinner_style: ProgressStyle,
    // Suprime as linhas impressas (usado em testes).
    quiet: bool,
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl BatchProgress {
    pub fn new() -> Self {
        Self::build(ProgressBar::new(100), false)
    }

    /// Instância sem saída alguma, para testes.
    pub fn hidden() -> Self {
        Self::build(ProgressBar::hidden(), true)
    }

    fn build(pb: ProgressBar, quiet: bool) -> Self {
        let bar_style = ProgressStyle::default_bar()
            .template("{prefix:.bold} |{bar:20.cyan/blue}| {pos:>3}% {msg}")
            .expect("invalid template")
            .progress_chars("█▓-");
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .expect("invalid template");
        Self {
            pb,
            bar_style,
            spinner_style,
            quiet,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    fn line(&self, msg: String) {
        if !self.quiet {
            self.pb.println(msg);
        }
    }

    /// Exibe o spinner de espera enquanto o motor não responde.
    pub fn waiting_for_engine(&self, url: &str, attempt: u32) {
        if attempt == 1 {
            self.pb.set_style(self.spinner_style.clone());
            self.pb.enable_steady_tick(Duration::from_millis(100));
        }
        self.pb
            .set_message(format!("Connecting to engine at {url} (attempt {attempt})"));
    }

    pub fn engine_ready(&self, url: &str) {
        self.pb.disable_steady_tick();
        self.pb.set_message("");
        self.line(format!(
            "{} Engine at {url} is ready",
            self.green.apply_to("✓")
        ));
    }

    /// Resumo do catálogo e do plano de ritmo antes do início do lote.
    pub fn session_started(&self, total: usize, skipped: usize, pending: usize, plan: &PacingPlan) {
        self.line(format!(
            "Found {total} prompts: {skipped} already done, {pending} to render"
        ));
        let mode = if plan.constrained {
            self.yellow.apply_to("constrained")
        } else {
            self.green.apply_to("full")
        };
        let ceiling = plan
            .max_resolution
            .map_or_else(|| "native".to_string(), |r| format!("{r}px"));
        self.line(format!(
            "Pacing: {mode} (max {ceiling}, timeout {}s, cooldown {}s)",
            plan.request_timeout.as_secs(),
            plan.inter_item_cooldown.as_secs()
        ));
    }

    /// Reinicia a barra para um novo item.
    pub fn start_item(&self, index: usize, count: usize, item: &WorkItem) {
        self.line(format!(
            "{} [{index}/{count}] {} {}",
            self.dim.apply_to("→"),
            item.raw_text,
            self.dim.apply_to(format!("({} {}px)", item.category, item.target_resolution))
        ));
        self.pb.set_style(self.bar_style.clone());
        self.pb.set_prefix(format!("{index}/{count}"));
        self.pb.set_position(0);
        self.pb.set_message("waiting for engine");
    }

    /// Atualiza a linha de status com a fração concluída e os ETAs.
    pub fn update(&self, estimate: &Estimate) {
        self.pb.set_position((estimate.fraction * 100.0).round() as u64);
        self.pb.set_message(format!(
            "item {} of {} | session {}",
            format_eta(estimate.item_remaining),
            format_eta(estimate.item_total),
            format_eta(estimate.session_eta)
        ));
    }

    /// Limpa a linha de status após a renderização retornar.
    pub fn finish_render(&self) {
        self.pb.set_position(0);
        self.pb.set_message("");
    }

    pub fn item_saved(&self, path: &Path, render: Option<Duration>) {
        let took = render.map_or_else(String::new, |d| format!(" in {:.1}s", d.as_secs_f64()));
        self.line(format!(
            "  {} Saved {}{took}",
            self.green.apply_to("✓"),
            path.display()
        ));
    }

    /// Exibe a causa da falha e a identidade do prompt.
    pub fn item_failed(&self, item: &WorkItem, err: &ForgeError) {
        self.line(format!(
            "  {} {} [{}]: {err}",
            self.red.apply_to("✗"),
            item.raw_text,
            item.content_key.short()
        ));
    }

    pub fn draining(&self) {
        self.line(format!(
            "  {} Interrupt received, stopping after the current item",
            self.yellow.apply_to("!")
        ));
    }

    /// Finaliza a barra e imprime o resumo da sessão.
    pub fn print_summary(&self, summary: &SessionSummary) {
        self.pb.finish_and_clear();
        if self.quiet {
            return;
        }
        let style = if summary.failed() == 0 { &self.green } else { &self.yellow };
        println!();
        println!("{}", style.apply_to("─── Session Summary ───"));
        println!(
            "  attempted {}  succeeded {}  skipped {}  completed {}/{}",
            summary.attempted, summary.succeeded, summary.skipped, summary.completed, summary.total
        );
        println!(
            "  elapsed {}",
            format_eta(Duration::from_millis(summary.elapsed_ms))
        );
        if let Some(avg) = summary.average_render_ms {
            println!("  average render {:.1}s", avg as f64 / 1000.0);
        }
        if summary.drained {
            println!("  {}", self.yellow.apply_to("stopped early on interrupt"));
        }
    }

    /// Lista o estado de cada prompt sem contatar o motor.
    pub fn print_status(&self, runs: &[ItemRun]) {
        if self.quiet {
            return;
        }
        for run in runs {
            let label = format!("{:<8}", run.state.to_string());
            let state = match run.state {
                ItemState::Skipped => self.green.apply_to(label),
                _ => self.yellow.apply_to(label),
            };
            println!(
                "  {state} {} {} {}",
                run.key.short(),
                self.dim.apply_to(format!("{:<7} {:>4}px", run.category.prefix(), run.resolution)),
                run.prompt
            );
        }
        let done = runs.iter().filter(|r| r.state == ItemState::Skipped).count();
        println!();
        println!(
            "  total {}  done {}  pending {}",
            runs.len(),
            done,
            runs.len() - done
        );
    }

    /// Informa o resultado da montagem da sprite sheet.
    pub fn sheet_written(&self, manifest: Option<&SheetManifest>, path: &Path) {
        match manifest {
            Some(m) => self.line(format!(
                "{} Sprite sheet with {} tiles ({} columns) written to {}",
                self.green.apply_to("✓"),
                m.tile_count,
                m.columns,
                path.display()
            )),
            None => self.line(format!(
                "{} No assets to pack into a sprite sheet",
                self.yellow.apply_to("!")
            )),
        }
    }

    /// Imprime o resumo completo em JSON (modo verbose).
    pub fn print_record(&self, summary: &SessionSummary) {
        if self.quiet {
            return;
        }
        println!();
        println!("{}", self.dim.apply_to("─── Session Record ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(summary).unwrap_or_default()
        );
    }
}

impl Default for BatchProgress {
    fn default() -> Self {
        Self::new()
    }
}
