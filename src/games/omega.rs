use rustc_hash::FxHashMap;

use crate::display::HexBoardDisplay;
use crate::game::{Game, Taken, ValidMoves};

pub const WHITE: usize = 0;
pub const BLACK: usize = 1;

/// One applied move plus the bookkeeping needed to invert it exactly.
#[derive(Clone, Copy, Debug)]
struct Applied {
    player: usize,
    piece: usize,
    pos: usize,
    /// Index the position occupied in `empty` before removal.
    slot: usize,
}

/// The Omega board game on a hexagonal board of side `board_size`.
///
/// Each turn a player places one white and one black stone on empty
/// cells, so the ply sequence by player is 0 0 1 1 0 0 …, with the piece
/// colour alternating every ply. The game ends when the playable cells
/// run out (the cell count rounded down to a multiple of four, so both
/// players get the same number of moves). A player's score is the
/// product of the sizes of the connected groups of their colour; the
/// higher product wins.
pub struct Omega {
    board_size: usize,
    cell_num: usize,
    /// Plies in a full game.
    total_steps: usize,
    steps_left: usize,
    depth: usize,
    root_depth: usize,
    next_piece: usize,
    next_player: usize,
    avail: [usize; 1],
    /// Stone colour per cell, `None` while empty.
    cells: Vec<Option<usize>>,
    neighbours: Vec<Vec<usize>>,
    /// Currently empty positions, in arbitrary order.
    empty: Vec<usize>,
    /// Position -> index in `empty`; only meaningful for empty cells.
    slot: Vec<usize>,
    history: Vec<Applied>,
}

impl Omega {
    pub fn new(board_size: usize) -> Self {
        assert!(board_size >= 2, "board size must be at least 2");
        let cell_num = 3 * board_size * board_size - 3 * board_size + 1;
        let total_steps = cell_num - cell_num % 4;

        let mut game = Self {
            board_size,
            cell_num,
            total_steps,
            steps_left: total_steps,
            depth: 0,
            root_depth: 0,
            next_piece: WHITE,
            next_player: 0,
            avail: [WHITE],
            cells: vec![None; cell_num],
            neighbours: Vec::with_capacity(cell_num),
            empty: (0..cell_num).collect(),
            slot: (0..cell_num).collect(),
            history: Vec::with_capacity(total_steps),
        };
        game.init_cells();
        game
    }

    /// Axial coordinates are laid out row by row (rows indexed by `q`),
    /// which is also the cell index order used for positions.
    fn init_cells(&mut self) {
        let s = self.board_size as i64;
        let valid = |q: i64, r: i64| q.abs() < s && r.abs() < s && (q + r).abs() < s;

        let mut index_of = FxHashMap::default();
        let mut axials = Vec::with_capacity(self.cell_num);
        for q in -(s - 1)..=(s - 1) {
            for r in -(s - 1)..=(s - 1) {
                if valid(q, r) {
                    index_of.insert((q, r), axials.len());
                    axials.push((q, r));
                }
            }
        }
        debug_assert_eq!(axials.len(), self.cell_num);

        const DIRS: [(i64, i64); 6] = [(-1, 1), (-1, 0), (0, -1), (1, -1), (1, 0), (0, 1)];
        for &(q, r) in &axials {
            let ns = DIRS
                .iter()
                .filter_map(|&(dq, dr)| index_of.get(&(q + dq, r + dr)).copied())
                .collect();
            self.neighbours.push(ns);
        }
    }

    pub fn board_size(&self) -> usize {
        self.board_size
    }

    pub fn cell_num(&self) -> usize {
        self.cell_num
    }

    /// Stone at `pos`, `None` while empty.
    pub fn cell(&self, pos: usize) -> Option<usize> {
        self.cells[pos]
    }

    pub fn neighbours(&self, pos: usize) -> &[usize] {
        &self.neighbours[pos]
    }

    /// Group products per colour, indexed by piece. Both start at 1, and
    /// every connected group of a colour multiplies into that colour's
    /// score.
    pub fn scores(&self) -> [f64; 2] {
        let mut scores = [1.0, 1.0];
        let mut visited = vec![false; self.cell_num];
        let mut queue = Vec::with_capacity(self.cell_num);

        for seed in 0..self.cell_num {
            let Some(piece) = self.cells[seed] else {
                continue;
            };
            if visited[seed] {
                continue;
            }
            visited[seed] = true;
            queue.clear();
            queue.push(seed);
            let mut group_size = 0usize;
            let mut head = 0;
            while head < queue.len() {
                let pos = queue[head];
                head += 1;
                group_size += 1;
                for &n in &self.neighbours[pos] {
                    if !visited[n] && self.cells[n] == Some(piece) {
                        visited[n] = true;
                        queue.push(n);
                    }
                }
            }
            scores[piece] *= group_size as f64;
        }
        scores
    }
}

impl Game for Omega {
    const PIECE_NUM: usize = 2;

    fn valid_moves(&self) -> ValidMoves<'_> {
        ValidMoves::new(&self.empty, self.next_piece)
    }

    fn current_depth(&self) -> usize {
        self.depth
    }

    fn next_player(&self) -> usize {
        self.next_player
    }

    fn available_pieces(&self) -> &[usize] {
        &self.avail
    }

    fn to_move_idx(&self, piece: usize, pos: usize) -> usize {
        pos + piece * self.cell_num
    }

    fn to_pos(&self, move_idx: usize) -> usize {
        move_idx % self.cell_num
    }

    fn to_piece(&self, move_idx: usize) -> usize {
        move_idx / self.cell_num
    }

    fn update(&mut self, move_idx: usize) {
        let pos = self.to_pos(move_idx);
        debug_assert_eq!(self.to_piece(move_idx), self.next_piece);
        debug_assert!(self.cells[pos].is_none());

        let slot = self.slot[pos];
        self.empty.swap_remove(slot);
        if slot < self.empty.len() {
            self.slot[self.empty[slot]] = slot;
        }
        self.cells[pos] = Some(self.next_piece);
        self.history.push(Applied {
            player: self.next_player,
            piece: self.next_piece,
            pos,
            slot,
        });

        self.steps_left -= 1;
        self.depth += 1;
        // every ply the piece colour flips, every second ply the player
        self.next_piece = self.depth & 1;
        self.next_player = (self.depth & 2) >> 1;
        self.avail = [self.next_piece];
    }

    fn undo(&mut self) {
        let applied = self.history.pop().expect("undo without a matching update");
        self.cells[applied.pos] = None;

        // reinsert at the exact slot the position was removed from
        self.empty.push(applied.pos);
        let last = self.empty.len() - 1;
        self.empty.swap(applied.slot, last);
        self.slot[self.empty[applied.slot]] = applied.slot;
        self.slot[self.empty[last]] = last;

        self.steps_left += 1;
        self.depth -= 1;
        self.next_piece = self.depth & 1;
        self.next_player = (self.depth & 2) >> 1;
        self.avail = [self.next_piece];
    }

    fn end(&self) -> bool {
        self.steps_left == 0
    }

    fn outcome(&self) -> f64 {
        let [white, black] = self.scores();
        if white > black {
            1.0
        } else if white < black {
            0.0
        } else {
            0.5
        }
    }

    fn mark_root(&mut self) {
        self.root_depth = self.depth;
    }

    fn select_root(&mut self) {
        while self.depth > self.root_depth {
            self.undo();
        }
    }

    fn last_move(&self) -> Taken {
        let applied = self.history.last().expect("no move has been made");
        Taken {
            player: applied.player,
            piece: applied.piece,
            pos: applied.pos,
        }
    }

    fn taken_move_at(&self, depth: usize) -> Taken {
        let applied = self.history[depth];
        Taken {
            player: applied.player,
            piece: applied.piece,
            pos: applied.pos,
        }
    }

    fn total_move_count(&self) -> usize {
        2 * self.cell_num
    }

    fn max_valid_moves(&self) -> usize {
        self.cell_num
    }

    fn piece_max_moves(&self, _piece: usize) -> usize {
        self.cell_num
    }

    fn max_turns(&self) -> usize {
        self.total_steps
    }

    fn max_depth(&self) -> usize {
        self.total_steps
    }

    fn expected_moves(&self) -> f64 {
        // a full turn for this engine spans four plies (two own, two
        // opponent)
        (self.steps_left / 4).max(1) as f64
    }
}

impl std::fmt::Display for Omega {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        HexBoardDisplay(self).fmt(f)
    }
}

/// Human-readable form of a move, e.g. `o7` for a white stone on cell 7.
pub fn move_notation(game: &Omega, move_idx: usize) -> String {
    let piece = if game.to_piece(move_idx) == WHITE {
        'o'
    } else {
        'x'
    };
    format!("{}{}", piece, game.to_pos(move_idx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_counts() {
        assert_eq!(Omega::new(2).cell_num(), 7);
        assert_eq!(Omega::new(3).cell_num(), 19);
        assert_eq!(Omega::new(5).cell_num(), 61);
    }

    #[test]
    fn playable_steps_are_a_multiple_of_four() {
        for size in 2..6 {
            let game = Omega::new(size);
            assert_eq!(game.max_depth() % 4, 0);
            assert!(game.max_depth() <= game.cell_num());
        }
    }

    #[test]
    fn neighbours_are_symmetric() {
        let game = Omega::new(4);
        for pos in 0..game.cell_num() {
            for &n in game.neighbours(pos) {
                assert!(game.neighbours(n).contains(&pos));
            }
        }
    }

    #[test]
    fn neighbour_degrees() {
        let game = Omega::new(3);
        let mut degrees: Vec<usize> = (0..game.cell_num())
            .map(|p| game.neighbours(p).len())
            .collect();
        degrees.sort_unstable();
        // 6 corners with 3 neighbours, 6 edge cells with 4, 7 interior
        // cells with 6
        assert_eq!(degrees[..6], [3, 3, 3, 3, 3, 3]);
        assert_eq!(degrees[6..12], [4, 4, 4, 4, 4, 4]);
        assert!(degrees[12..].iter().all(|&d| d == 6));
    }

    #[test]
    fn piece_and_player_follow_depth_parity() {
        let mut game = Omega::new(3);
        let expected = [
            (WHITE, 0),
            (BLACK, 0),
            (WHITE, 1),
            (BLACK, 1),
            (WHITE, 0),
            (BLACK, 0),
        ];
        for &(piece, player) in &expected {
            assert_eq!(game.available_pieces(), &[piece]);
            assert_eq!(game.next_player(), player);
            let m = game.valid_moves().next().unwrap();
            assert_eq!(m.piece, piece);
            game.update(game.to_move_idx(m.piece, m.pos));
        }
    }

    #[test]
    fn update_undo_is_identity() {
        let mut game = Omega::new(3);
        game.update(game.to_move_idx(WHITE, 4));
        game.update(game.to_move_idx(BLACK, 11));

        let empty_before = game.empty.clone();
        let slot_before = game.slot.clone();
        let depth = game.current_depth();

        game.update(game.to_move_idx(WHITE, 7));
        game.undo();

        assert_eq!(game.empty, empty_before);
        assert_eq!(game.slot, slot_before);
        assert_eq!(game.current_depth(), depth);
        assert_eq!(game.cell(7), None);
        assert_eq!(game.next_piece, WHITE);
    }

    #[test]
    fn move_index_bijection() {
        let game = Omega::new(3);
        for piece in 0..2 {
            for pos in 0..game.cell_num() {
                let m = game.to_move_idx(piece, pos);
                assert_eq!(game.to_piece(m), piece);
                assert_eq!(game.to_pos(m), pos);
            }
        }
    }

    #[test]
    fn group_products() {
        let mut game = Omega::new(3);
        // Cells 0,1 are adjacent on the top row; 3 starts the second row.
        // Whites at 0,1,3 (0-1 adjacent, 0-3 adjacent => one group of 3),
        // blacks at 16,18 (not adjacent => two groups of 1).
        for (piece, pos) in [(WHITE, 0), (BLACK, 16), (WHITE, 1), (BLACK, 18), (WHITE, 3)] {
            // drive the board directly; parity is irrelevant for scoring
            game.cells[pos] = Some(piece);
        }
        let [white, black] = game.scores();
        assert!(game.neighbours(0).contains(&1));
        assert!(game.neighbours(0).contains(&3));
        assert_eq!(white, 3.0);
        assert_eq!(black, 1.0);
    }

    #[test]
    fn full_random_game_terminates_with_an_outcome() {
        use rand::rngs::SmallRng;
        use rand::{Rng, SeedableRng};

        let mut rng = SmallRng::seed_from_u64(7);
        let mut game = Omega::new(3);
        while !game.end() {
            let n = game.valid_moves().len();
            let m = game.valid_moves().nth(rng.gen_range(0..n)).unwrap();
            game.update(game.to_move_idx(m.piece, m.pos));
        }
        assert_eq!(game.current_depth(), 16);
        let outcome = game.outcome();
        assert!(outcome == 0.0 || outcome == 0.5 || outcome == 1.0);
    }

    #[test]
    fn select_root_rewinds_to_the_mark() {
        let mut game = Omega::new(3);
        game.update(game.to_move_idx(WHITE, 0));
        game.update(game.to_move_idx(BLACK, 1));
        game.mark_root();

        game.update(game.to_move_idx(WHITE, 2));
        game.update(game.to_move_idx(BLACK, 3));
        game.select_root();

        assert_eq!(game.current_depth(), 2);
        assert_eq!(game.cell(2), None);
        assert_eq!(game.cell(3), None);
        assert_eq!(game.cell(0), Some(WHITE));
    }
}
