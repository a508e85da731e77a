use ati_force_torque_sensor::{Sensor, SensorConfig, WrenchLog, DEFAULT_TARE_SAMPLES};
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Stream readings from an ATI force/torque sensor")]
struct Args {
    /// センサのIPアドレス
    #[arg(long, default_value = "192.168.1.1")]
    ip: IpAddr,
    /// ストリーミングした値の平滑化係数 (0, 1]
    #[arg(long)]
    smoothing: Option<f64>,
    /// 測定値を追記するCSVファイル
    #[arg(long)]
    log: Option<PathBuf>,
    /// 表示する回数
    #[arg(long, default_value_t = 100)]
    count: usize,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if let Err(err) = run(args) {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), ati_force_torque_sensor::SensorError> {
    println!("Demonstration started!");
    let period = Duration::from_millis(100);

    let mut config = SensorConfig::new(args.ip);
    config.smoothing = args.smoothing;

    // 力覚センサと接続
    let mut sensor = Sensor::open(config)?;

    // 力覚センサに力がはたらいていなくても，力覚センサからの値は0とはならない．
    // そこで，力覚センサから何度か値を取得して，その平均をオフセットとしてとることでゼロ点を設定する．
    println!("Performing calibration. Do not touch the sensor...");
    sensor.tare(DEFAULT_TARE_SAMPLES)?;
    println!("Calibration done!");

    let mut log = args.log.map(WrenchLog::new);

    sensor.start_stream()?;
    for i in 0..args.count {
        // レンチを取得
        let wrench = sensor.data()?;
        let [fx, fy, fz, tx, ty, tz] = wrench.to_array();
        println!(
            "[{}/{}]: F = ({:8.3}, {:8.3}, {:8.3}) N, T = ({:9.3}, {:9.3}, {:9.3}) N*mm",
            i + 1,
            args.count,
            fx,
            fy,
            fz,
            tx,
            ty,
            tz
        );

        if let Some(log) = log.as_mut() {
            log.append(&chrono::Local::now(), &wrench)?;
        }

        // 次の観測時刻まで待機
        std::thread::sleep(period);
    }
    sensor.stop_stream()?;

    println!("Demonstration finished!");
    Ok(())
}
