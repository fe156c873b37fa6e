//! Foot calibration entry.
//!
//! Prompts for foot length / width, shoe size and preferred overlay position,
//! validates them and writes the record through the calibration store.
//!
//! Usage: calibrate [config.toml] [length width size]

use anyhow::{bail, Context, Result};
use std::io::{self, Write};

use ar_tryon::calibration::{
    CalibrationData, CalibrationStore, FOOT_LENGTH_RANGE, FOOT_WIDTH_RANGE, SHOE_SIZE_RANGE,
    SHOE_SIZE_STEP,
};
use ar_tryon::config::Config;

const DEFAULT_CONFIG_PATH: &str = "tryon.toml";

/// 空入力なら既定値
fn prompt(label: &str, default: f32) -> Result<f32> {
    loop {
        print!("{} [{}]: ", label, default);
        io::stdout().flush()?;
        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            bail!("input closed");
        }
        let input = input.trim();
        if input.is_empty() {
            return Ok(default);
        }
        match input.parse::<f32>() {
            Ok(v) => return Ok(v),
            Err(e) => println!("  数値を入力してください ({})", e),
        }
    }
}

fn parse_numbers(args: &[String]) -> Result<Option<(f32, f32, f32)>> {
    if args.is_empty() {
        return Ok(None);
    }
    if args.len() != 3 {
        bail!("expected <length> <width> <size>, got {} values", args.len());
    }
    let parse = |s: &String| s.parse::<f32>().with_context(|| format!("invalid number: {}", s));
    Ok(Some((parse(&args[0])?, parse(&args[1])?, parse(&args[2])?)))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config_path, numbers) = match args.first() {
        Some(first) if first.ends_with(".toml") => (first.clone(), &args[1..]),
        _ => (DEFAULT_CONFIG_PATH.to_string(), &args[..]),
    };
    let config = Config::load_or_default(&config_path);
    let store = CalibrationStore::open_dir(&config.calibration.dir, &config.calibration.key);

    println!("=== 足キャリブレーション ({}) ===", env!("BUILD_ID"));
    println!("保存先: {}/{}.json", config.calibration.dir, config.calibration.key);

    let current = store.get();
    match current {
        Some(cal) => println!(
            "現在: 足長 {:.1}cm / 足幅 {:.1}cm / サイズ {} / 位置 ({:.0}, {:.0})",
            cal.foot_length, cal.foot_width, cal.shoe_size, cal.preferred_position.x, cal.preferred_position.y
        ),
        None => println!("現在: 未設定"),
    }
    println!();

    let data = match parse_numbers(numbers)? {
        Some((length, width, size)) => CalibrationData::new(length, width, size),
        None => {
            let base = current.unwrap_or_else(|| CalibrationData::new(25.0, 10.0, 9.0));
            println!(
                "範囲: 足長 {}-{}cm, 足幅 {}-{}cm, サイズ {}-{} ({}刻み)",
                FOOT_LENGTH_RANGE.0,
                FOOT_LENGTH_RANGE.1,
                FOOT_WIDTH_RANGE.0,
                FOOT_WIDTH_RANGE.1,
                SHOE_SIZE_RANGE.0,
                SHOE_SIZE_RANGE.1,
                SHOE_SIZE_STEP
            );
            let length = prompt("足長 (cm)", base.foot_length)?;
            let width = prompt("足幅 (cm)", base.foot_width)?;
            let size = prompt("靴サイズ", base.shoe_size)?;
            let x = prompt("表示位置 x (%)", base.preferred_position.x)?;
            let y = prompt("表示位置 y (%)", base.preferred_position.y)?;
            CalibrationData::new(length, width, size).with_preferred_position(x, y)
        }
    };

    // 範囲外は保存されず、既存の値はそのまま
    store.set(data).context("calibration rejected")?;
    println!();
    println!(
        "保存しました: 足長 {:.1}cm / 足幅 {:.1}cm / サイズ {} (相対サイズ {:.2})",
        data.foot_length,
        data.foot_width,
        data.shoe_size,
        data.relative_foot_size()
    );
    Ok(())
}
