//! Headless batch front-end: open, edit, undo, save.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{info, warn};

use crate::{
    engine::raster::RasterImage,
    op::{OpValue, OperationKind, ValueShape},
    runtime::handle::{RuntimeConfig, spawn_editor},
    session::image::UndoOutcome,
};

/// Apply undoable edits to an image
#[derive(Parser, Debug)]
#[command(name = "pixledit", author, version, about)]
pub struct Cli {
    /// Image to open
    pub input: PathBuf,

    /// Edit to apply, e.g. `brighten=10`, `levels=10:200`, `vflip`. Repeatable.
    #[arg(short, long = "edit", value_name = "EDIT", value_parser = parse_edit)]
    pub edits: Vec<EditSpec>,

    /// Undo this many steps after applying the edits
    #[arg(long, default_value_t = 0)]
    pub undo: usize,

    /// Write the displayed image here
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the remaining history as JSON
    #[arg(long)]
    pub history: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditSpec {
    pub kind: OperationKind,
    pub value: Option<OpValue>,
}

fn number(text: &str) -> Result<f32, String> {
    text.trim()
        .parse()
        .map_err(|_| format!("`{text}` is not a number"))
}

fn numbers(text: &str) -> Result<Vec<f32>, String> {
    text.split(',').map(number).collect()
}

/// Parses `NAME` or `NAME=VALUE` into an edit.
pub fn parse_edit(text: &str) -> Result<EditSpec, String> {
    use OperationKind as K;

    let (name, arg) = match text.split_once('=') {
        Some((name, arg)) => (name.trim(), Some(arg.trim())),
        None => (text.trim(), None),
    };

    let kind = match name {
        "brighten" => K::Brighten,
        "contrast" => K::Contrast,
        "exposure" => K::Exposure,
        "levels" => K::Levels,
        "box-blur" => K::BoxBlur,
        "gaussian-blur" => K::GaussianBlur,
        "median-blur" => K::MedianBlur,
        "bilateral-blur" => K::BilateralBlur,
        "hsl" => K::Hsl,
        "matrix" => K::ColorMatrix,
        "edges" => K::Edges,
        "vflip" => K::VerticalFlip,
        "hflip" => K::HorizontalFlip,
        "transpose" => K::Transpose,
        "rotate180" => K::Rotate180,
        other => return Err(format!("unknown edit `{other}`")),
    };

    let value = match (kind.traits().shape, arg) {
        (ValueShape::Nothing, None) => None,
        (ValueShape::Nothing, Some(_)) => return Err(format!("{name} takes no value")),
        (_, None) => return Err(format!("{name} needs a value")),
        (ValueShape::Scalar, Some(arg)) => Some(OpValue::Scalar(number(arg)?)),
        (ValueShape::Range, Some(arg)) => {
            let (lower, upper) = arg
                .split_once(':')
                .ok_or_else(|| format!("{name} expects LOWER:UPPER, got `{arg}`"))?;
            Some(OpValue::Range {
                lower: number(lower)?,
                upper: number(upper)?,
            })
        }
        (ValueShape::Radius, Some(arg)) => Some(OpValue::Radius(
            arg.parse().map_err(|_| format!("`{arg}` is not a radius"))?,
        )),
        (ValueShape::Hsl, Some(arg)) => match numbers(arg)?.as_slice() {
            [hue, saturation, lightness] => Some(OpValue::Hsl {
                hue: *hue,
                saturation: *saturation,
                lightness: *lightness,
            }),
            _ => return Err(format!("{name} expects HUE,SATURATION,LIGHTNESS")),
        },
        (ValueShape::Matrix, Some(arg)) => {
            let matrix = numbers(arg)?;
            if matrix.len() != 20 {
                return Err(format!("{name} expects 20 values, got {}", matrix.len()));
            }
            Some(OpValue::Matrix(matrix))
        }
    };

    Ok(EditSpec { kind, value })
}

pub async fn run(cli: Cli) -> Result<()> {
    let editor = spawn_editor::<RasterImage>(RuntimeConfig::default());

    let id = editor
        .open_file(&cli.input)
        .await
        .with_context(|| format!("opening {}", cli.input.display()))?;

    for edit in &cli.edits {
        let outcome = editor
            .apply_edit(id, edit.kind, edit.value.clone())
            .await?
            .outcome()
            .await
            .with_context(|| format!("applying {}", edit.kind))?;
        info!("{} -> {outcome:?}", edit.kind);
    }

    for _ in 0..cli.undo {
        match editor.undo_last(id).await?.outcome().await? {
            UndoOutcome::Undone { kind, .. } => info!("undid {kind}"),
            UndoOutcome::NothingToUndo => {
                warn!("history is empty, stopping early");
                break;
            }
        }
    }

    if let Some(output) = &cli.output {
        let session = editor
            .session(id)
            .await?
            .ok_or_else(|| anyhow!("session {id} is no longer open"))?;
        let frame = session.surface().snapshot();
        image::save_buffer(
            output,
            frame.pixels(),
            frame.width(),
            frame.height(),
            image::ColorType::Rgba8,
        )
        .with_context(|| format!("writing {}", output.display()))?;
        info!("wrote {}", output.display());
    }

    if cli.history {
        let entries = editor.history(id).await?;
        println!("{}", serde_json::to_string_pretty(&entries)?);
    }

    editor.shutdown().await?;
    Ok(())
}
