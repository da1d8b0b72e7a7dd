//! Remote control example: dial in an exposure and record a short clip

use std::time::Duration;
use tokio::time::sleep;

use ptpip::Camera;

#[tokio::main]
async fn main() -> ptpip::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let ip = std::env::var("CAMERA_IP").unwrap_or_else(|_| "192.168.122.1".to_string());

    let mut camera = Camera::new(ip);
    camera.connect().await?;

    println!("Camera connected!");

    camera.set_iso("800").await?;
    camera.set_shutter_speed("1/50").await?;
    camera.set_white_balance("daylight").await?;
    camera.set_exposure_compensation(-0.3).await?;

    println!("Recording 5 seconds...");
    camera.start_recording().await?;
    sleep(Duration::from_secs(5)).await;
    camera.stop_recording().await?;

    println!("Zooming in...");
    camera.start_zoom("in", 3).await?;
    sleep(Duration::from_secs(1)).await;
    camera.stop_zoom().await?;

    println!("{}", camera.get_settings().await?);

    camera.disconnect().await?;
    Ok(())
}
