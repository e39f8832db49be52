//! Terminal output formatter

use std::io::{IsTerminal, Write};
use takc_core::{CacheEntry, CompressionRate, CompressionRun, EntrySource, QueryAnswer};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

fn stdout() -> StandardStream {
    let choice = if std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none() {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

fn source_color(source: EntrySource) -> Color {
    match source {
        EntrySource::Primary => Color::Green,
        EntrySource::Fallback => Color::Yellow,
    }
}

fn write_colored(out: &mut StandardStream, color: Color, text: &str) -> std::io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(color)))?;
    write!(out, "{}", text)?;
    out.reset()
}

pub fn print_run(run: &CompressionRun) -> std::io::Result<()> {
    let mut out = stdout();
    writeln!(
        out,
        "Compressed {} ({} tokens)",
        run.task_type, run.original_tokens
    )?;

    for rate in CompressionRate::ALL {
        if let Some(entry) = run.entries.get(&rate) {
            let m = &entry.metadata;
            write!(
                out,
                "  {:<7} {:>3}x  {:>6} tokens  {:>6.1}x  ",
                rate, m.target_ratio, m.compressed_tokens, m.achieved_ratio
            )?;
            write_colored(&mut out, source_color(m.source), &m.source.to_string())?;
            writeln!(out)?;
        } else if let Some(reason) = run.failures.get(&rate) {
            write!(out, "  {:<7} ", rate)?;
            write_colored(&mut out, Color::Red, "FAILED")?;
            writeln!(out, "  {}", reason)?;
        }
    }
    Ok(())
}

pub fn print_entry(entry: &CacheEntry, with_metadata: bool) -> std::io::Result<()> {
    let mut out = stdout();
    if with_metadata {
        let m = &entry.metadata;
        writeln!(out, "Task type:    {}", entry.task_type)?;
        writeln!(out, "Rate:         {} ({}x target)", entry.rate, m.target_ratio)?;
        writeln!(
            out,
            "Tokens:       {} -> {} ({:.1}x)",
            m.original_tokens, m.compressed_tokens, m.achieved_ratio
        )?;
        write!(out, "Source:       ")?;
        write_colored(&mut out, source_color(m.source), &m.source.to_string())?;
        writeln!(out)?;
        writeln!(out, "Model:        {}", m.model_id)?;
        writeln!(out, "Strategy:     {}", m.strategy)?;
        writeln!(out, "Created:      {}", m.created_at.to_rfc3339())?;
        if !m.task_description.is_empty() {
            writeln!(out, "Description:  {}", m.task_description)?;
        }
        writeln!(out)?;
    }
    writeln!(out, "{}", entry.compressed_text)
}

pub fn print_answer(answer: &QueryAnswer) -> std::io::Result<()> {
    let mut out = stdout();
    writeln!(out, "{}", answer.response)?;
    writeln!(out)?;

    let m = &answer.metadata;
    let routed = match m.complexity {
        Some(complexity) => format!("{} complexity", complexity),
        None => "forced".to_string(),
    };
    out.set_color(ColorSpec::new().set_dimmed(true))?;
    writeln!(
        out,
        "rate {} ({}) | {} -> {} tokens | {} | {}",
        answer.rate_used,
        routed,
        m.original_tokens,
        m.compressed_tokens,
        m.source,
        m.created_at.format("%Y-%m-%d %H:%M UTC")
    )?;
    out.reset()
}

pub fn print_listing(pairs: &[(String, CompressionRate)]) -> std::io::Result<()> {
    let mut out = stdout();
    if pairs.is_empty() {
        writeln!(out, "No cached entries")?;
        return Ok(());
    }

    let mut current: Option<&str> = None;
    for (task_type, rate) in pairs {
        if current != Some(task_type.as_str()) {
            if current.is_some() {
                writeln!(out)?;
            }
            write!(out, "{}:", task_type)?;
            current = Some(task_type.as_str());
        }
        write!(out, " {}", rate)?;
    }
    writeln!(out)
}
