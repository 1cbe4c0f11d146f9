//! Classic 2-D gradient (Perlin) noise.
//!
//! Single octave, single precision, lattice repeating every 1024 units with a
//! zero permutation offset. Output is roughly in `[-1, 1]` and exactly zero on
//! integer lattice points.

/// Lattice period along both axes.
pub const REPEAT: f32 = 1024.0;

#[rustfmt::skip]
const PERMUTATION: [u8; 256] = [
    151, 160, 137, 91, 90, 15, 131, 13, 201, 95, 96, 53, 194, 233, 7, 225,
    140, 36, 103, 30, 69, 142, 8, 99, 37, 240, 21, 10, 23, 190, 6, 148,
    247, 120, 234, 75, 0, 26, 197, 62, 94, 252, 219, 203, 117, 35, 11, 32,
    57, 177, 33, 88, 237, 149, 56, 87, 174, 20, 125, 136, 171, 168, 68, 175,
    74, 165, 71, 134, 139, 48, 27, 166, 77, 146, 158, 231, 83, 111, 229, 122,
    60, 211, 133, 230, 220, 105, 92, 41, 55, 46, 245, 40, 244, 102, 143, 54,
    65, 25, 63, 161, 1, 216, 80, 73, 209, 76, 132, 187, 208, 89, 18, 169,
    200, 196, 135, 130, 116, 188, 159, 86, 164, 100, 109, 198, 173, 186, 3, 64,
    52, 217, 226, 250, 124, 123, 5, 202, 38, 147, 118, 126, 255, 82, 85, 212,
    207, 206, 59, 227, 47, 16, 58, 17, 182, 189, 28, 42, 223, 183, 170, 213,
    119, 248, 152, 2, 44, 154, 163, 70, 221, 153, 101, 155, 167, 43, 172, 9,
    129, 22, 39, 253, 19, 98, 108, 110, 79, 113, 224, 232, 178, 185, 112, 104,
    218, 246, 97, 228, 251, 34, 242, 193, 238, 210, 144, 12, 191, 179, 162, 241,
    81, 51, 145, 235, 249, 14, 239, 107, 49, 192, 214, 31, 181, 199, 106, 157,
    184, 84, 204, 176, 115, 121, 50, 45, 127, 4, 150, 254, 138, 236, 205, 93,
    222, 114, 67, 29, 24, 72, 243, 141, 128, 195, 78, 66, 215, 61, 156, 180,
];

#[rustfmt::skip]
const GRADIENTS: [(f32, f32); 16] = [
    (1.0, 1.0), (-1.0, 1.0), (1.0, -1.0), (-1.0, -1.0),
    (1.0, 0.0), (-1.0, 0.0), (1.0, 0.0), (-1.0, 0.0),
    (0.0, 1.0), (0.0, -1.0), (0.0, 1.0), (0.0, -1.0),
    (1.0, 0.0), (-1.0, 0.0), (0.0, -1.0), (0.0, 1.0),
];

/// Permutation table lookup; indices wrap into the doubled 512-entry range.
fn perm(index: usize) -> usize {
    usize::from(PERMUTATION[index & 255])
}

fn grad(hash: usize, x: f32, y: f32) -> f32 {
    let (gx, gy) = GRADIENTS[hash & 15];
    x * gx + y * gy
}

fn lerp(t: f32, a: f32, b: f32) -> f32 {
    a + t * (b - a)
}

fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

/// Lattice cell index of `v`, wrapped to [`REPEAT`] and then to the table.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn cell(v: f32) -> (usize, usize) {
    let i = (v % REPEAT).floor() as i32;
    let next = ((i + 1) as f32 % REPEAT) as i32;
    // `& 255` on two's complement keeps negative cells in range.
    ((i & 255) as usize, (next & 255) as usize)
}

/// Sample 2-D noise at `(x, y)`.
pub fn pnoise2(x: f32, y: f32) -> f32 {
    if !x.is_finite() || !y.is_finite() {
        return 0.0;
    }
    let (i, ii) = cell(x);
    let (j, jj) = cell(y);

    let x = x - x.floor();
    let y = y - y.floor();
    let fx = fade(x);
    let fy = fade(y);

    let a = perm(i);
    let aa = perm(a + j);
    let ab = perm(a + jj);
    let b = perm(ii);
    let ba = perm(b + j);
    let bb = perm(b + jj);

    lerp(
        fy,
        lerp(fx, grad(perm(aa), x, y), grad(perm(ba), x - 1.0, y)),
        lerp(fx, grad(perm(ab), x, y - 1.0), grad(perm(bb), x - 1.0, y - 1.0)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permutation_is_a_permutation() {
        let mut seen = [false; 256];
        for &p in &PERMUTATION {
            assert!(!seen[usize::from(p)]);
            seen[usize::from(p)] = true;
        }
    }

    #[test]
    fn test_zero_on_lattice_points() {
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (3.0, 7.0), (255.0, 256.0), (1023.0, 2.0)] {
            assert!(pnoise2(x, y).abs() < 1e-6, "({x}, {y})");
        }
    }

    #[test]
    fn test_bounded() {
        for step in 0..2000u16 {
            let x = f32::from(step) * 0.137;
            let y = f32::from(step) * 0.291 + 0.5;
            let n = pnoise2(x, y);
            assert!((-1.5..=1.5).contains(&n), "noise({x}, {y}) = {n}");
        }
    }

    #[test]
    fn test_varies_between_lattice_points() {
        let nonzero = (0..100u8)
            .map(|k| pnoise2(f32::from(k) * 0.31 + 0.1, f32::from(k) * 0.17 + 0.2))
            .filter(|n| n.abs() > 1e-3)
            .count();
        assert!(nonzero > 50);
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(pnoise2(12.34, 56.78).to_bits(), pnoise2(12.34, 56.78).to_bits());
    }

    #[test]
    fn test_non_finite_input_is_silent() {
        assert_eq!(pnoise2(f32::NAN, 1.0), 0.0);
        assert_eq!(pnoise2(1.0, f32::INFINITY), 0.0);
    }
}
