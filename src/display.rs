use std::fmt;

use crate::games::omega::{Omega, WHITE};

/// Newtype wrapper rendering a hexagonal board row by row, with each row
/// indented by its distance from the middle row.
pub struct HexBoardDisplay<'a>(pub &'a Omega);

fn row_lengths(board_size: usize) -> impl Iterator<Item = usize> {
    let s = board_size as i64;
    (-(s - 1)..=(s - 1)).map(move |q| (2 * s - 1 - q.abs()) as usize)
}

impl fmt::Display for HexBoardDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let game = self.0;
        let mut pos = 0;
        for len in row_lengths(game.board_size()) {
            let indent = 2 * game.board_size() - 1 - len;
            write!(f, "{}", " ".repeat(indent))?;
            for _ in 0..len {
                let c = match game.cell(pos) {
                    None => '.',
                    Some(piece) if piece == WHITE => 'o',
                    Some(_) => 'x',
                };
                write!(f, "{c} ")?;
                pos += 1;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Companion view printing every cell's index, for entering moves in the
/// terminal demos.
pub struct HexIndexDisplay<'a>(pub &'a Omega);

impl fmt::Display for HexIndexDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let game = self.0;
        let mut pos = 0;
        for len in row_lengths(game.board_size()) {
            let indent = 2 * game.board_size() - 1 - len;
            write!(f, "{}", "  ".repeat(indent))?;
            for _ in 0..len {
                write!(f, "{pos:>3} ")?;
                pos += 1;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_lengths_sum_to_cell_count() {
        for size in 2..6 {
            let game = Omega::new(size);
            assert_eq!(row_lengths(size).sum::<usize>(), game.cell_num());
        }
    }

    #[test]
    fn renders_one_char_per_cell() {
        let game = Omega::new(3);
        let out = format!("{game}");
        let stones = out.chars().filter(|&c| c == '.').count();
        assert_eq!(stones, game.cell_num());
    }
}
