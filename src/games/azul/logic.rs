use super::model::{GameMode, Player, Tile, Wall, WallPattern, BOARD_SIZE, COLORS};

pub const FLOOR_PENALTIES: [i32; 7] = [1, 1, 2, 2, 2, 3, 3];

const ROW_BONUS: i32 = 2;
const COLUMN_BONUS: i32 = 7;
const COLOR_BONUS: i32 = 10;

/// Where a completed pattern line lands on the wall.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WallPlacement {
    Placed(usize),
    NoLegalColumn,
}

fn row_has_color(wall: &Wall, row: usize, color: Tile) -> bool {
    wall[row].iter().any(|&c| c == Some(color))
}

fn column_has_color(wall: &Wall, col: usize, color: Tile) -> bool {
    (0..BOARD_SIZE).any(|r| wall[r][col] == Some(color))
}

/// Columns of `row` still able to take `color` in free mode, ascending.
pub fn free_columns(wall: &Wall, row: usize, color: Tile) -> Vec<usize> {
    if row_has_color(wall, row, color) {
        return Vec::new();
    }
    (0..BOARD_SIZE)
        .filter(|&col| wall[row][col].is_none() && !column_has_color(wall, col, color))
        .collect()
}

/// Resolve the wall column for `color` in `row`. Free mode takes the lowest
/// legal column.
pub fn wall_column(wall: &Wall, row: usize, color: Tile, mode: GameMode, pattern: &WallPattern) -> WallPlacement {
    match mode {
        GameMode::Pattern => match pattern[row].iter().position(|&c| c == color) {
            Some(col) if wall[row][col].is_none() => WallPlacement::Placed(col),
            _ => WallPlacement::NoLegalColumn,
        },
        GameMode::Free => match free_columns(wall, row, color).first() {
            Some(&col) => WallPlacement::Placed(col),
            None => WallPlacement::NoLegalColumn,
        },
    }
}

/// Pattern lines that can legally take `color`. The floor line is always an
/// option and is not listed.
pub fn get_valid_lines(player: &Player, color: Tile, mode: GameMode, pattern: &WallPattern) -> Vec<usize> {
    let mut lines = Vec::new();
    if color.is_marker() {
        return lines;
    }

    for (i, line) in player.pattern_lines.iter().enumerate() {
        let accepts = match line.color {
            _ if line.is_empty() => true,
            Some(c) => c == color && line.count < i + 1,
            None => false,
        };
        if !accepts {
            continue;
        }

        if wall_column(&player.wall, i, color, mode, pattern) != WallPlacement::NoLegalColumn {
            lines.push(i);
        }
    }

    lines
}

fn count_continuous(wall: &Wall, row: usize, col: usize, d_row: isize, d_col: isize) -> i32 {
    let mut count = 0;
    let mut r = row as isize + d_row;
    let mut c = col as isize + d_col;

    while (0..BOARD_SIZE as isize).contains(&r) && (0..BOARD_SIZE as isize).contains(&c) {
        if wall[r as usize][c as usize].is_none() {
            break;
        }
        count += 1;
        r += d_row;
        c += d_col;
    }

    count
}

/// Points for a tile landing at (`row`, `col`). Counts the contiguous run
/// on each axis; a tile joining both a row and a column run scores itself
/// once per axis.
pub fn score_tile(wall: &Wall, row: usize, col: usize) -> i32 {
    let horizontal = count_continuous(wall, row, col, 0, -1) + count_continuous(wall, row, col, 0, 1);
    let vertical = count_continuous(wall, row, col, -1, 0) + count_continuous(wall, row, col, 1, 0);

    if horizontal == 0 && vertical == 0 {
        return 1;
    }

    let both_axes = (horizontal > 0 && vertical > 0) as i32;
    1 + horizontal + vertical + both_axes
}

pub fn calculate_floor_penalty(num_tiles: usize) -> i32 {
    FLOOR_PENALTIES.iter().take(num_tiles).sum()
}

/// Returns (row bonus, column bonus, color bonus) points.
pub fn calculate_end_game_bonus(wall: &Wall) -> (i32, i32, i32) {
    let rows = wall.iter().filter(|row| row.iter().all(|c| c.is_some())).count() as i32;
    let cols = (0..BOARD_SIZE)
        .filter(|&col| (0..BOARD_SIZE).all(|r| wall[r][col].is_some()))
        .count() as i32;
    let colors = COLORS
        .iter()
        .filter(|&&color| wall.iter().flatten().filter(|&&c| c == Some(color)).count() == BOARD_SIZE)
        .count() as i32;

    (rows * ROW_BONUS, cols * COLUMN_BONUS, colors * COLOR_BONUS)
}
