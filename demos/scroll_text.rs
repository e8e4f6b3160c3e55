use std::time::{Duration, Instant};

use kagero::{
    RecordingBackend, RenderContext, SdfFontData, Stage, StageConfig, TextEvent, TextProp,
    TextProps,
    font_face::FontDescriptor,
    text::{Contain, WordBreak},
    texture::TextureId,
};

const CHARSET: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 .,;:!?'-";

fn make_book(paragraphs: usize) -> String {
    let sentence = "The quick brown fox jumps over the lazy dog. ";
    let mut text = String::new();
    for i in 0..paragraphs {
        text.push_str(&format!("Chapter {i}. "));
        for _ in 0..12 {
            text.push_str(sentence);
        }
        text.push('\n');
    }
    text
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = StageConfig {
        app_width: 1280.0,
        app_height: 720.0,
        ..StageConfig::default()
    };
    let mut stage = Stage::new(config, RecordingBackend::new()).expect("valid stage config");

    let mut now = Instant::now();
    let atlas_loader = Box::new(|id: TextureId| log::info!("atlas {:?} requested", id));
    let face = stage.register_font_face(FontDescriptor::new("Mono"), atlas_loader, now);
    stage.font_loaded(face, SdfFontData::monospace(42.0, 24.0, CHARSET));
    let atlas = stage.fonts.face(face).expect("registered face").atlas().clone();
    stage.texture_loaded(&atlas, (1024, 1024), 4 * 1024 * 1024);

    let text = stage.create_text(TextProps {
        text: make_book(500),
        font_family: "Mono".into(),
        font_size: 21.0,
        x: 100.0,
        y: 100.0,
        width: 600.0,
        height: 400.0,
        contain: Contain::Both,
        scrollable: true,
        word_break: WordBreak::BreakWord,
        ..TextProps::default()
    });

    let frame = Duration::from_millis(16);
    let mut scroll_y = 0.0;
    for i in 0..600 {
        stage.draw_frame(now, &[(text, RenderContext::default())]);
        for (id, event) in stage.take_text_events() {
            match event {
                TextEvent::Loaded { width, height } => {
                    log::debug!("text {:?} loaded: {}x{}", id, width, height)
                }
                TextEvent::Failed(err) => log::error!("text {:?} failed: {}", id, err),
            }
        }

        if i % 60 == 0 {
            let stats = stage.text.debug_stats(text).unwrap_or_default();
            log::info!(
                "scroll_y {:>8.1}: {} layouts, {} chars in last layout, {} buffer bytes, {} ops",
                scroll_y,
                stats.layout_count,
                stats.last_layout_num_characters,
                stats.buffer_bytes,
                stage.backend.ops().len()
            );
        }
        stage.backend.take_ops();

        scroll_y += 40.0;
        stage.set_text_prop(text, TextProp::ScrollY(scroll_y));
        now += frame;
    }

    let info = stage.memory_info();
    log::info!(
        "texture memory: {} of {} bytes, {} textures loaded",
        info.mem_used,
        info.critical_threshold,
        info.loaded_textures
    );
}
