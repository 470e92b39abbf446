use std::sync::Arc;

use jigsaw_builder::{
    AdjacencyParams, Arrangement, BuildError, BuildLevel, BuildParams, CalibrationIoError,
    CalibrationRecord, GridCoord, ThresholdProcessor,
};
use jigsaw_core::{BinaryMask, Board, Piece, PieceKind, PieceTemplate, RgbImage};
use nalgebra::Point2;

fn square(side: usize, color: [u8; 3]) -> Arc<PieceTemplate> {
    let mask = BinaryMask {
        width: side,
        height: side,
        data: vec![true; side * side],
    };
    Arc::new(
        PieceTemplate::from_parts(PieceKind::Template, mask, vec![color; side * side])
            .expect("square"),
    )
}

fn grid_board(rows: usize, cols: usize, pitch: f32) -> Board {
    let mut board = Board::new();
    for r in 0..rows {
        for c in 0..cols {
            let shade = (40 * (r * cols + c)) as u8;
            board.add_piece(Piece::new(
                square(10, [shade, 255 - shade, 60]),
                Point2::new(c as f32 * pitch, r as f32 * pitch),
            ));
        }
    }
    board
}

#[test]
fn adjacent_round_trip_preserves_board_and_matrix() {
    let params = BuildParams {
        adjacency: AdjacencyParams {
            tau_adj: 4.0,
            ..AdjacencyParams::default()
        },
        ..BuildParams::default()
    };
    let built = Arrangement::adjacent(grid_board(2, 3, 12.0), &params).expect("adjacent");

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("calibration.json");
    built.save(&path).expect("save");
    let loaded = Arrangement::load(&path).expect("load");

    assert_eq!(loaded.level(), BuildLevel::Adjacent);
    assert_eq!(loaded.solution().len(), built.solution().len());
    assert_eq!(
        loaded.solution().piece_locations(),
        built.solution().piece_locations()
    );
    let (a, b) = (
        built.adjacency().expect("adjacency"),
        loaded.adjacency().expect("adjacency"),
    );
    assert_eq!(a.matrix, b.matrix);
    assert_eq!(b.params.tau_adj, 4.0);
    assert!(b.is_adjacent(0, 1));
    assert!(!b.is_adjacent(0, 2));

    // Saving again reproduces the same record.
    let again = dir.path().join("again.json");
    loaded.save(&again).expect("save");
    assert_eq!(
        CalibrationRecord::load_json(&path).expect("first"),
        CalibrationRecord::load_json(&again).expect("second")
    );
}

#[test]
fn gridded_round_trip_preserves_coordinates() {
    let built =
        Arrangement::gridded(grid_board(3, 3, 11.0), &BuildParams::default()).expect("gridded");
    let grid = built.grid().expect("grid");
    assert_eq!(grid.dimensions(), (3, 3));
    assert_eq!(grid.coord(5), Some(GridCoord::new(1, 2)));
    assert_eq!(grid.piece_at(2, 0), Some(6));

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("grid.json");
    built.save(&path).expect("save");
    let loaded = Arrangement::load(&path).expect("load");
    let reloaded = loaded.grid().expect("grid");
    assert_eq!(reloaded.interlock, grid.interlock);
    assert_eq!(reloaded.coords(), grid.coords());
}

#[test]
fn adjacency_is_symmetric_with_true_diagonal() {
    let built = Arrangement::adjacent(grid_board(3, 4, 13.0), &BuildParams::default())
        .expect("adjacent");
    let rows = built.adjacency().expect("adjacency").matrix.rows();
    for (i, row) in rows.iter().enumerate() {
        assert!(row[i]);
        for (j, &v) in row.iter().enumerate() {
            assert_eq!(v, rows[j][i]);
        }
    }
}

#[test]
fn garbage_file_is_a_parse_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{ not json").expect("write");
    assert!(matches!(
        Arrangement::load(&path),
        Err(CalibrationIoError::Parse(_))
    ));
    assert!(matches!(
        Arrangement::load(dir.path().join("missing.json")),
        Err(CalibrationIoError::Io(_))
    ));
}

#[test]
fn builds_from_thresholded_image() {
    let mut image = RgbImage::new(40, 20);
    for y in 3..13 {
        for x in 2..12 {
            image.put(x, y, [200, 50, 50]);
        }
        for x in 14..24 {
            image.put(x, y, [50, 200, 50]);
        }
    }
    let built = Arrangement::from_image_processing(
        &image,
        &ThresholdProcessor::default(),
        None,
        &BuildParams::default(),
        BuildLevel::Gridded,
    )
    .expect("build");
    assert_eq!(built.solution().len(), 2);
    let grid = built.grid().expect("grid");
    assert_eq!(grid.coord(0), Some(GridCoord::new(0, 0)));
    assert_eq!(grid.coord(1), Some(GridCoord::new(0, 1)));
}

#[test]
fn conflicting_layout_fails_to_grid() {
    let mut board = Board::new();
    let t = square(10, [0, 0, 0]);
    board.add_piece(Piece::new(t.clone(), Point2::new(0.0, 0.0)));
    board.add_piece(Piece::new(t.clone(), Point2::new(11.0, 0.0)));
    board.add_piece(Piece::new(t, Point2::new(12.0, 4.0)));
    let err = Arrangement::gridded(board, &BuildParams::default()).unwrap_err();
    assert_eq!(
        err,
        BuildError::GridInconsistency {
            piece: 2,
            existing: GridCoord::new(0, 1),
            proposed: GridCoord::new(1, 1),
        }
    );
}
