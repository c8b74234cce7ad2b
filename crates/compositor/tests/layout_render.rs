use clipcast_compositor::background::gradient_colors;
use clipcast_compositor::layout::{PADDING, PIP_FACTOR, PIP_INSET};
use clipcast_compositor::{render_layout, ResolvedBackground};
use clipcast_media_model::LayoutId;
use image::{Rgba, RgbaImage};
use proptest::prelude::*;

const SCREEN_BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
const CAMERA_RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn render(layout: LayoutId, background: &ResolvedBackground) -> RgbaImage {
    let screen = RgbaImage::from_pixel(160, 90, SCREEN_BLUE);
    let camera = RgbaImage::from_pixel(64, 48, CAMERA_RED);
    let mut canvas = RgbaImage::new(320, 180);
    render_layout(&mut canvas, layout, Some(&screen), Some(&camera), background);
    canvas
}

#[test]
fn every_layout_is_deterministic() {
    let background = ResolvedBackground::Gradient {
        from: Rgba([0xf6, 0xd3, 0x65, 255]),
        to: Rgba([0xfd, 0xa0, 0x85, 255]),
    };
    for layout in LayoutId::ALL {
        let first = render(layout, &background);
        let second = render(layout, &background);
        assert_eq!(
            fnv1a_64(first.as_raw()),
            fnv1a_64(second.as_raw()),
            "layout {layout} is not deterministic"
        );
    }
}

#[test]
fn default_layout_places_bubble_bottom_right() {
    let canvas = render(LayoutId::ScreenCameraBr, &ResolvedBackground::none());
    let size = 180.0 * PIP_FACTOR;
    let cx = 320.0 - PIP_INSET - size / 2.0;
    let cy = 180.0 - PIP_INSET - size / 2.0;

    assert_eq!(*canvas.get_pixel(cx as u32, cy as u32), CAMERA_RED);
    // Screen fills the padded area away from the bubble.
    assert_eq!(*canvas.get_pixel(60, 60), SCREEN_BLUE);
    // Padding shows the background.
    assert_eq!(*canvas.get_pixel(2, 2), Rgba([0, 0, 0, 255]));
}

#[test]
fn bottom_left_mirrors_bubble() {
    let canvas = render(LayoutId::ScreenCameraBl, &ResolvedBackground::none());
    let size = 180.0 * PIP_FACTOR;
    let cx = PIP_INSET + size / 2.0;
    let cy = 180.0 - PIP_INSET - size / 2.0;
    assert_eq!(*canvas.get_pixel(cx as u32, cy as u32), CAMERA_RED);
}

#[test]
fn camera_only_full_covers_canvas() {
    let canvas = render(LayoutId::CameraOnlyFull, &ResolvedBackground::none());
    assert!(canvas.pixels().all(|p| *p == CAMERA_RED));
}

#[test]
fn gradient_background_shows_in_padding() {
    let (from, _) = gradient_colors("linear-gradient(135deg, #4facfe 0%, #00f2fe 100%)");
    let canvas = render(
        LayoutId::ScreenOnly,
        &ResolvedBackground::Gradient {
            from,
            to: Rgba([0x00, 0xf2, 0xfe, 255]),
        },
    );
    let corner = canvas.get_pixel(0, 0);
    assert!((corner[0] as i32 - 0x4f).abs() <= 2);
    assert!(canvas.get_pixel(PADDING as u32 + 20, 90)[2] == 255);
}

proptest! {
    #[test]
    fn compositor_is_referentially_transparent(
        layout_index in 0usize..7,
        screen_w in 1u32..64, screen_h in 1u32..64,
        camera_w in 1u32..64, camera_h in 1u32..64,
        shade in any::<u8>(),
    ) {
        let layout = LayoutId::ALL[layout_index];
        let screen = RgbaImage::from_pixel(screen_w, screen_h, Rgba([shade, 0, 0, 255]));
        let camera = RgbaImage::from_pixel(camera_w, camera_h, Rgba([0, shade, 0, 255]));
        let background = ResolvedBackground::Solid(Rgba([shade, shade, shade, 255]));

        let mut a = RgbaImage::new(96, 54);
        let mut b = RgbaImage::from_pixel(96, 54, Rgba([9, 9, 9, 9]));
        render_layout(&mut a, layout, Some(&screen), Some(&camera), &background);
        render_layout(&mut b, layout, Some(&screen), Some(&camera), &background);
        prop_assert_eq!(a.as_raw(), b.as_raw());
    }
}
