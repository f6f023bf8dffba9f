use canvas_render::core::{FragmentElement, MemoryAssetLoader, RendererConfig};
use canvas_render::rendering::{FragmentRender, FragmentRenderer, TypstBackend};
use std::env;
use std::fs;
use std::process;

fn usage(program: &str) -> ! {
    eprintln!("Fragment Renderer");
    eprintln!("Usage: {} <markup> [options]", program);
    eprintln!("\nOptions:");
    eprintln!("  --size <pt>        Font size (default 20)");
    eprintln!("  --color <hex>      Text colour (default #1e1e1e)");
    eprintln!("  --family <name>    Font family (default: Typst's default)");
    eprintln!("  --font <path>      Register a font file (repeatable)");
    eprintln!("  --scale <n>        Device pixels per point (default 2)");
    eprintln!("  --config <path>    JSON renderer configuration");
    eprintln!("  --svg              Write the sanitized SVG instead of a PNG");
    eprintln!("  -o <path>          Output file (default fragment.png)");
    process::exit(1);
}

fn option_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == name)
        .map(|pos| match args.get(pos + 1) {
            Some(value) => value.as_str(),
            None => {
                eprintln!("Error: {} requires a value", name);
                process::exit(1);
            }
        })
}

fn parse_or_exit<T: std::str::FromStr>(value: &str, name: &str) -> T {
    value.parse().unwrap_or_else(|_| {
        eprintln!("Error: invalid value {:?} for {}", value, name);
        process::exit(1);
    })
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args[1].starts_with('-') {
        usage(&args[0]);
    }
    let markup = &args[1];

    let mut config = match option_value(&args, "--config") {
        Some(path) => {
            let json = fs::read_to_string(path).unwrap_or_else(|e| {
                eprintln!("Error: cannot read {}: {}", path, e);
                process::exit(1);
            });
            RendererConfig::from_json(&json).unwrap_or_else(|e| {
                eprintln!("Error: {}", e);
                process::exit(1);
            })
        }
        None => RendererConfig {
            raster_scale: 2.0,
            ..RendererConfig::default()
        },
    };
    if let Some(scale) = option_value(&args, "--scale") {
        config.raster_scale = parse_or_exit(scale, "--scale");
    }

    // Local font files are served to the backend under their path.
    let mut loader = MemoryAssetLoader::new();
    for (pos, arg) in args.iter().enumerate() {
        if arg != "--font" {
            continue;
        }
        let Some(path) = args.get(pos + 1) else {
            eprintln!("Error: --font requires a path");
            process::exit(1);
        };
        let bytes = fs::read(path).unwrap_or_else(|e| {
            eprintln!("Error: cannot read font {}: {}", path, e);
            process::exit(1);
        });
        loader = loader.with_asset(path.clone(), bytes);
        config.font_urls.push(path.clone());
    }

    let variant = option_value(&args, "--family").unwrap_or("default");
    if variant == "default" {
        config
            .font_families
            .entry("default".to_string())
            .or_insert_with(|| "libertinus serif".to_string());
    }

    let size: f64 = option_value(&args, "--size")
        .map(|v| parse_or_exit(v, "--size"))
        .unwrap_or(20.0);
    let color = option_value(&args, "--color").unwrap_or("#1e1e1e");
    let output = option_value(&args, "-o").unwrap_or("fragment.png");
    let write_svg = args.iter().any(|arg| arg == "--svg");

    let renderer = match FragmentRenderer::new(TypstBackend::new(), loader, config) {
        Ok(renderer) => renderer,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let element = FragmentElement::new(markup.as_str(), size, variant, color);
    let fragment = match renderer.render(&element).await {
        FragmentRender::Rendered(fragment) => fragment,
        FragmentRender::Unavailable(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let written = if write_svg {
        fs::write(output, fragment.svg.as_bytes())
    } else {
        match fragment.image.to_png() {
            Ok(png_data) => fs::write(output, png_data),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
    };
    if let Err(e) = written {
        eprintln!("Error: cannot write {}: {}", output, e);
        process::exit(1);
    }

    println!(
        "Wrote {} ({}x{} pt, {}x{} px)",
        output,
        fragment.width,
        fragment.height,
        fragment.image.width(),
        fragment.image.height()
    );
}
