use clap::Parser;

use pixledit::{
    cli::{Cli, EditSpec, parse_edit, run},
    op::{OpValue, OperationKind},
};

#[test]
fn edit_syntax_covers_every_value_shape() {
    assert_eq!(
        parse_edit("brighten=10").unwrap(),
        EditSpec {
            kind: OperationKind::Brighten,
            value: Some(OpValue::Scalar(10.0))
        }
    );
    assert_eq!(
        parse_edit("levels=10:200").unwrap().value,
        Some(OpValue::Range {
            lower: 10.0,
            upper: 200.0
        })
    );
    assert_eq!(
        parse_edit("median-blur=3").unwrap().value,
        Some(OpValue::Radius(3))
    );
    assert_eq!(
        parse_edit("hsl=30,1.2,1").unwrap().value,
        Some(OpValue::Hsl {
            hue: 30.0,
            saturation: 1.2,
            lightness: 1.0
        })
    );
    let identity = "1,0,0,0,0,0,1,0,0,0,0,0,1,0,0,0,0,0,1,0";
    assert_eq!(
        parse_edit(&format!("matrix={identity}")).unwrap().kind,
        OperationKind::ColorMatrix
    );
    assert_eq!(
        parse_edit("rotate180").unwrap(),
        EditSpec {
            kind: OperationKind::Rotate180,
            value: None
        }
    );
}

#[test]
fn malformed_edits_are_rejected() {
    assert!(parse_edit("sharpen=2").is_err());
    assert!(parse_edit("vflip=1").is_err());
    assert!(parse_edit("box-blur").is_err());
    assert!(parse_edit("box-blur=-1").is_err());
    assert!(parse_edit("levels=10").is_err());
    assert!(parse_edit("hsl=1,2").is_err());
    assert!(parse_edit("matrix=1,2,3").is_err());
}

#[test]
fn flags_map_onto_the_batch_run() {
    let cli = Cli::try_parse_from([
        "pixledit", "in.png", "-e", "vflip", "--edit", "contrast=5", "--undo", "1", "-o",
        "out.png", "--history",
    ])
    .unwrap();
    assert_eq!(cli.edits.len(), 2);
    assert_eq!(cli.edits[1].kind, OperationKind::Contrast);
    assert_eq!(cli.undo, 1);
    assert!(cli.history);
    assert!(Cli::try_parse_from(["pixledit", "in.png", "-e", "blur"]).is_err());
}

#[tokio::test]
async fn batch_run_writes_the_displayed_image() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("in.png");
    let output = dir.path().join("out.png");
    let pixels: Vec<u8> = (0..4 * 2 * 4).map(|i| (i * 9 % 256) as u8).collect();
    image::save_buffer(&input, &pixels, 4, 2, image::ColorType::Rgba8).expect("write input");

    let cli = Cli::try_parse_from([
        "pixledit",
        input.to_str().expect("utf8 path"),
        "-e",
        "brighten=30",
        "-e",
        "transpose",
        "--undo",
        "2",
        "-o",
        output.to_str().expect("utf8 path"),
    ])
    .unwrap();
    run(cli).await.expect("run");

    let written = image::open(&output).expect("read output").to_rgba8();
    assert_eq!(written.dimensions(), (4, 2));
    assert_eq!(written.into_raw(), pixels);
}
