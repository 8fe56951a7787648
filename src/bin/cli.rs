use anyhow::{anyhow, bail, Context, Result};
use lensgate::platform::ProfileProvider;
use lensgate::zoom::{next_power_of_two, previous_power_of_two};
use lensgate::{
    CameraFacing, CameraMode, CapabilityNegotiator, ConfigurationRequest, DeviceCatalog,
    FrameRate, LensOptions, LensgateConfig, Quality, ZoomRatioMapper,
};
use serde::Serialize;
use std::env;
use std::sync::Arc;

const USAGE: &str = "Usage: lensgate-cli <command> --profile <file> [--config <file>] [--json]

Commands:
  list-devices
  capabilities <device_id>
  negotiate [--device <id>] [--facing back|front|external] [--mode photo|video|qr]
            [--quality sd|hd|fhd|uhd] [--fps <n>]
  zoom <device_id> <ratio>";

struct Options {
    positional: Vec<String>,
    profile: Option<String>,
    config: Option<String>,
    device: Option<String>,
    facing: Option<String>,
    mode: Option<String>,
    quality: Option<String>,
    fps: Option<u32>,
    json: bool,
}

fn parse_options(args: &[String]) -> Result<Options> {
    let mut options = Options {
        positional: Vec::new(),
        profile: None,
        config: None,
        device: None,
        facing: None,
        mode: None,
        quality: None,
        fps: None,
        json: false,
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = |name: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| anyhow!("{} requires a value", name))
        };
        match arg.as_str() {
            "--profile" => options.profile = Some(value("--profile")?),
            "--config" => options.config = Some(value("--config")?),
            "--device" => options.device = Some(value("--device")?),
            "--facing" => options.facing = Some(value("--facing")?),
            "--mode" => options.mode = Some(value("--mode")?),
            "--quality" => options.quality = Some(value("--quality")?),
            "--fps" => {
                let fps = value("--fps")?;
                options.fps = Some(fps.parse().with_context(|| format!("invalid fps {}", fps))?);
            }
            "--json" => options.json = true,
            other => options.positional.push(other.to_string()),
        }
    }
    Ok(options)
}

fn main() -> Result<()> {
    lensgate::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    let command = args[1].as_str();
    let options = parse_options(&args[2..])?;
    match command {
        "list-devices" => cmd_list_devices(&options),
        "capabilities" => cmd_capabilities(&options),
        "negotiate" => cmd_negotiate(&options),
        "zoom" => cmd_zoom(&options),
        _ => {
            eprintln!("Unknown command: {}\n\n{}", command, USAGE);
            std::process::exit(1);
        }
    }
}

fn load_catalog(options: &Options) -> Result<DeviceCatalog> {
    let profile = options
        .profile
        .as_deref()
        .ok_or_else(|| anyhow!("--profile is required"))?;
    let provider = ProfileProvider::load_from_file(profile)?;

    let config = match options.config.as_deref() {
        Some(path) => LensgateConfig::load_layered(path)?,
        None => LensgateConfig::default(),
    };
    config.validate().map_err(|e| anyhow!(e))?;

    Ok(DeviceCatalog::build(Arc::new(provider), config))
}

fn print<T: Serialize + std::fmt::Debug>(json: bool, value: &T) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{:#?}", value);
    }
    Ok(())
}

fn cmd_list_devices(options: &Options) -> Result<()> {
    let catalog = load_catalog(options)?;
    let devices = catalog.enumerate();
    if options.json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    for device in devices {
        let role = match catalog.main_device(device.facing()) {
            Some(main) if main == &device => "main",
            _ => "aux",
        };
        let qualities: Vec<String> = device.supported_qualities().map(|q| q.to_string()).collect();
        println!(
            "{}: {:?} {}{} zoom x{:.2} video [{}]",
            device.id(),
            device.facing(),
            role,
            if device.is_logical() { " logical" } else { "" },
            device.intrinsic_zoom_ratio(),
            qualities.join(", ")
        );
    }
    Ok(())
}

fn cmd_capabilities(options: &Options) -> Result<()> {
    let device_id = options
        .positional
        .first()
        .ok_or_else(|| anyhow!("Usage: lensgate-cli capabilities <device_id>"))?;
    let catalog = load_catalog(options)?;
    let device = catalog
        .device(device_id)
        .ok_or_else(|| anyhow!("camera {} not found", device_id))?;
    print(options.json, device)
}

fn cmd_negotiate(options: &Options) -> Result<()> {
    let catalog = load_catalog(options)?;

    let mut request = ConfigurationRequest {
        device_id: options.device.clone(),
        frame_rate: options.fps.map(FrameRate),
        ..ConfigurationRequest::default()
    };
    if let Some(facing) = options.facing.as_deref() {
        request.facing = parse_facing(facing)?;
    }
    if let Some(mode) = options.mode.as_deref() {
        request.mode = parse_mode(mode)?;
    }
    if let Some(quality) = options.quality.as_deref() {
        request.quality =
            Some(Quality::parse(quality).ok_or_else(|| anyhow!("unknown quality {}", quality))?);
    }

    let selected = CapabilityNegotiator::resolve(&catalog, &request, request.device_id.as_deref())
        .ok_or_else(|| anyhow!("no usable camera in profile"))?;

    #[derive(Debug, Serialize)]
    struct Negotiated {
        requested: ConfigurationRequest,
        resolved: ConfigurationRequest,
    }
    print(
        options.json,
        &Negotiated {
            requested: request,
            resolved: selected.to_request(),
        },
    )
}

fn cmd_zoom(options: &Options) -> Result<()> {
    let (device_id, ratio) = match options.positional.as_slice() {
        [device_id, ratio, ..] => (device_id, ratio),
        _ => bail!("Usage: lensgate-cli zoom <device_id> <ratio>"),
    };
    let ratio: f32 = ratio
        .parse()
        .with_context(|| format!("invalid zoom ratio {}", ratio))?;

    let catalog = load_catalog(options)?;
    let device = catalog
        .device(device_id)
        .ok_or_else(|| anyhow!("camera {} not found", device_id))?;

    #[derive(Debug, Serialize)]
    struct ZoomReport {
        approximate: f32,
        exact: f32,
        display: f32,
        active_breakpoint: lensgate::ZoomBreakpoint,
        zoom_in: f32,
        zoom_out: f32,
        next_power_of_two: f32,
        previous_power_of_two: f32,
        lens_options: LensOptions,
    }

    let exact = device
        .zoom_bounds()
        .clamp(ZoomRatioMapper::exact_ratio_for(device, ratio));
    print(
        options.json,
        &ZoomReport {
            approximate: ratio,
            exact,
            display: ZoomRatioMapper::display_ratio(device, exact),
            active_breakpoint: ZoomRatioMapper::active_breakpoint(device, exact),
            zoom_in: ZoomRatioMapper::zoom_in(device, exact),
            zoom_out: ZoomRatioMapper::zoom_out(device, exact),
            next_power_of_two: next_power_of_two(exact),
            previous_power_of_two: previous_power_of_two(exact),
            lens_options: LensOptions::for_device(&catalog, device),
        },
    )
}

fn parse_facing(value: &str) -> Result<CameraFacing> {
    match value.to_ascii_lowercase().as_str() {
        "back" => Ok(CameraFacing::Back),
        "front" => Ok(CameraFacing::Front),
        "external" => Ok(CameraFacing::External),
        other => bail!("unknown facing {}", other),
    }
}

fn parse_mode(value: &str) -> Result<CameraMode> {
    match value.to_ascii_lowercase().as_str() {
        "photo" => Ok(CameraMode::Photo),
        "video" => Ok(CameraMode::Video),
        "qr" => Ok(CameraMode::Qr),
        other => bail!("unknown mode {}", other),
    }
}
