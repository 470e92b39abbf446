use std::sync::Arc;

use approx::assert_relative_eq;
use jigsaw_core::{BinaryMask, Piece, PieceKind, PieceTemplate, Rgb, RgbImage};
use jigsaw_matcher::{
    EdgeMatcher, EdgeParams, EdgeShapeMethod, KeypointMatcher, MatchError, MatchStrategy,
    Matcher, MomentsMatcher, Score,
};
use nalgebra::Point2;

fn piece_from(kind: PieceKind, rows: &[&str], color: impl Fn(usize, usize) -> Rgb) -> Piece {
    let h = rows.len();
    let w = rows[0].len();
    let mut mask = BinaryMask::new(w, h);
    let mut image = RgbImage::new(w, h);
    for (y, row) in rows.iter().enumerate() {
        for (x, c) in row.bytes().enumerate() {
            if c == b'#' {
                mask.set(x, y, true);
            }
            image.put(x, y, color(x, y));
        }
    }
    Piece::from_mask_and_image(kind, &mask, &image, Point2::origin()).expect("piece")
}

fn block(kind: PieceKind, side: usize, color: impl Fn(usize, usize) -> Rgb) -> Piece {
    let row = "#".repeat(side);
    let rows: Vec<&str> = (0..side).map(|_| row.as_str()).collect();
    piece_from(kind, &rows, color)
}

fn l_shape() -> Vec<String> {
    (0..12)
        .map(|y| {
            (0..12)
                .map(|x| if y < 6 && x >= 6 { '.' } else { '#' })
                .collect()
        })
        .collect()
}

/// Rotate a row pattern by +90 degrees in image coordinates: `(x, y) -> (h-1-y, x)`.
fn rotate_rows(rows: &[String]) -> Vec<String> {
    let h = rows.len();
    let w = rows[0].len();
    (0..w)
        .map(|ny| {
            (0..h)
                .map(|nx| rows[h - 1 - nx].as_bytes()[ny] as char)
                .collect()
        })
        .collect()
}

#[test]
fn moments_self_distance_is_zero() {
    let m = MomentsMatcher::default();
    let rows = l_shape();
    let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
    for piece in [
        block(PieceKind::Template, 10, |_, _| [0, 0, 0]),
        piece_from(PieceKind::Template, &refs, |_, _| [0, 0, 0]),
    ] {
        let s = m.score_pieces(&piece, &piece).expect("score");
        assert_relative_eq!(s.magnitude(), 0.0, epsilon = 1e-6);
        assert!(m.compare(&piece, &piece).expect("compare"));
    }
}

#[test]
fn moments_distinguish_square_from_l_shape() {
    let m = MomentsMatcher::default();
    let rows = l_shape();
    let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
    let square = block(PieceKind::Template, 12, |_, _| [0, 0, 0]);
    let l = piece_from(PieceKind::Template, &refs, |_, _| [0, 0, 0]);
    let s = m.score_pieces(&square, &l).expect("score");
    assert!(s.magnitude() > 0.1, "{s:?}");
}

#[test]
fn edge_gate_rejects_single_color_outlier() {
    let m = EdgeMatcher::default();
    let dark = block(PieceKind::Regular, 10, |_, _| [0, 0, 0]);
    let right_white = block(PieceKind::Regular, 10, |x, _| {
        if x == 9 {
            [255, 255, 255]
        } else {
            [0, 0, 0]
        }
    });

    let Score::Edge { shape, color } = m.score_pieces(&dark, &right_white).expect("score") else {
        panic!("edge score expected");
    };
    assert!(shape.iter().all(|d| *d < 100.0));
    assert!(color[1] > 400.0, "right side colour {}", color[1]);
    assert!(color[0] < 400.0 && color[2] < 400.0 && color[3] < 400.0);
    assert!(!m.compare(&dark, &right_white).expect("compare"));
    assert!(m.compare(&dark, &dark).expect("compare"));
}

#[test]
fn edge_coords_method_sees_tab_vs_flat() {
    let m = EdgeMatcher::new(EdgeParams {
        method: EdgeShapeMethod::Coords,
        tau_shape: 0.5,
        ..EdgeParams::default()
    });
    let flat = piece_from(
        PieceKind::Regular,
        &["##########"; 9],
        |_, _| [50, 50, 50],
    );
    let tab = piece_from(
        PieceKind::Regular,
        &[
            "########..",
            "########..",
            "########..",
            "##########",
            "##########",
            "##########",
            "########..",
            "########..",
            "########..",
        ],
        |_, _| [50, 50, 50],
    );
    let Score::Edge { shape, .. } = m.score_pieces(&flat, &tab).expect("score") else {
        panic!("edge score expected");
    };
    assert!(shape[1] > 0.5, "right side {}", shape[1]);
    assert!(!m.compare(&flat, &tab).expect("compare"));
}

#[test]
fn edge_matcher_requires_regular_pieces() {
    let m = EdgeMatcher::default();
    let template = block(PieceKind::Template, 8, |_, _| [0, 0, 0]);
    assert_eq!(
        m.process(&template).unwrap_err(),
        MatchError::TypeMismatch {
            expected: "regular",
            found: "template"
        }
    );
}

#[test]
fn comparing_different_kinds_is_a_type_mismatch() {
    let m = Matcher::from(MomentsMatcher::default());
    let a = block(PieceKind::Template, 8, |_, _| [0, 0, 0]);
    let b = block(PieceKind::Regular, 8, |_, _| [0, 0, 0]);
    assert!(matches!(
        m.compare(&a, &b),
        Err(MatchError::TypeMismatch { .. })
    ));
}

#[test]
fn feature_of_another_strategy_is_rejected() {
    let moments = MomentsMatcher::default();
    let keypoint = KeypointMatcher::default();
    let p = block(PieceKind::Template, 8, |_, _| [0, 0, 0]);
    let f = keypoint.process(&p).expect("keypoints");
    assert!(matches!(
        moments.score(&f, &f),
        Err(MatchError::TypeMismatch { expected: "moments", found: "keypoint" })
    ));
}

#[test]
fn keypoints_recover_quarter_turn() {
    let m = KeypointMatcher::default();
    let color = |x: usize, y: usize| [(x * 20) as u8, (y * 20) as u8, 100];
    let rows = l_shape();
    let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
    let upright = piece_from(PieceKind::Template, &refs, color);

    let s = m.score_pieces(&upright, &upright).expect("score");
    assert_relative_eq!(s.magnitude(), 0.0, epsilon = 1e-6);
    assert_relative_eq!(s.rotation().expect("rotation"), 0.0, epsilon = 1e-3);
    assert!(m.compare(&upright, &upright).expect("compare"));

    // Rotate shape and colours together.
    let turned_rows = rotate_rows(&rows);
    let turned_refs: Vec<&str> = turned_rows.iter().map(String::as_str).collect();
    let turned = piece_from(PieceKind::Template, &turned_refs, |x, y| color(y, 11 - x));

    let s = m.score_pieces(&turned, &upright).expect("score");
    let Score::Keypoint { matches, rotation, .. } = s else {
        panic!("keypoint score expected");
    };
    assert!(matches >= 3, "only {matches} matches");
    let rotation = rotation.expect("rotation");
    assert!((rotation - 90.0).abs() < 10.0, "rotation {rotation}");
}
