//! Show the normalized layout of a timeline.

use std::path::PathBuf;

use serde::Serialize;

use clipweave_processing_core::normalize;
use clipweave_timeline_model::{split_lanes, AssetKind, LoadedTimeline, VisualSegment};

#[derive(Debug, Serialize)]
struct PlanEntry {
    kind: AssetKind,
    start_ms: u64,
    end_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    rescale_from: Option<(u32, u32)>,
}

#[derive(Debug, Serialize)]
struct Plan {
    total_ms: u64,
    width: u32,
    height: u32,
    framerate: u32,
    visual: Vec<PlanEntry>,
    audio: Vec<PlanEntry>,
    issues: Vec<String>,
}

pub fn run(manifest: PathBuf, json: bool) -> anyhow::Result<()> {
    let timeline = LoadedTimeline::load(&manifest)
        .map_err(|e| anyhow::anyhow!("Failed to load timeline: {e}"))?;
    let plan = build_plan(&timeline);

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("Timeline: {}", manifest.display());
    println!(
        "  Duration: {} ms, {}x{} @ {}fps",
        plan.total_ms, plan.width, plan.height, plan.framerate
    );
    println!();
    println!("Visual covering ({} entries):", plan.visual.len());
    for entry in &plan.visual {
        let note = match entry.rescale_from {
            Some((w, h)) => format!("  (rescaled from {w}x{h})"),
            None => String::new(),
        };
        println!(
            "  {:<6} {:>7}-{:<7} ms{}",
            entry.kind.as_str(),
            entry.start_ms,
            entry.end_ms,
            note
        );
    }
    println!();
    println!("Audio clips ({}):", plan.audio.len());
    for entry in &plan.audio {
        println!("  {:>7}-{:<7} ms", entry.start_ms, entry.end_ms);
    }

    if !plan.issues.is_empty() {
        println!();
        println!("Skipped segments:");
        for issue in &plan.issues {
            println!("  - {issue}");
        }
    }

    Ok(())
}

fn build_plan(timeline: &LoadedTimeline) -> Plan {
    let manifest = &timeline.manifest;
    let total_ms = timeline.total_duration_ms();
    let (images, videos, clips) = split_lanes(timeline.assets.clone());
    let covering = normalize(&images, &videos, total_ms);

    let visual = covering
        .iter()
        .map(|segment| {
            let range = segment.range();
            let rescale_from = match segment {
                VisualSegment::Image(image) if image.needs_scaling(manifest.width, manifest.height) => {
                    Some((image.width, image.height))
                }
                _ => None,
            };
            PlanEntry {
                kind: segment.kind(),
                start_ms: range.start_ms,
                end_ms: range.end_ms,
                rescale_from,
            }
        })
        .collect();

    let audio = clips
        .iter()
        .filter(|clip| clip.data.is_some())
        .map(|clip| PlanEntry {
            kind: AssetKind::Audio,
            start_ms: clip.range.start_ms,
            end_ms: clip.range.end_ms,
            rescale_from: None,
        })
        .collect();

    Plan {
        total_ms,
        width: manifest.width,
        height: manifest.height,
        framerate: manifest.framerate,
        visual,
        audio,
        issues: manifest.validate(),
    }
}
