//! Connect to a camera, print its settings and grab a few preview frames

use ptpip::Camera;

#[tokio::main]
async fn main() -> ptpip::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let ip = std::env::var("CAMERA_IP").unwrap_or_else(|_| "192.168.122.1".to_string());

    let mut camera = Camera::new(ip);
    camera.connect().await?;

    let settings = camera.get_settings().await?;
    println!("{settings}");

    let mut frames = camera.start_live_view()?;
    for _ in 0..30 {
        if let Some(jpeg) = frames.recv().await {
            println!("frame: {} bytes", jpeg.len());
        }
    }
    camera.stop_live_view();

    camera.disconnect().await?;
    Ok(())
}
