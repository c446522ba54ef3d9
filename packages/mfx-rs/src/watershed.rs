//! Marker-controlled watershed on a 3-D grid.
//!
//! Flooding proceeds from the markers in order of increasing image value
//! over the 6-connected neighbourhood, restricted to `mask`. Ties are broken
//! by insertion order so the result is a deterministic function of the
//! inputs.

use ndarray::Array3;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

const NEIGHBOURS: [[i64; 3]; 6] = [
    [-1, 0, 0],
    [1, 0, 0],
    [0, -1, 0],
    [0, 1, 0],
    [0, 0, -1],
    [0, 0, 1],
];

#[derive(Debug)]
struct Front {
    value: f64,
    age: u64,
    index: [usize; 3],
}

impl PartialEq for Front {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Front {}

impl PartialOrd for Front {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Front {
    // Reversed: BinaryHeap is a max-heap and we pop the lowest value first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .value
            .total_cmp(&self.value)
            .then_with(|| other.age.cmp(&self.age))
    }
}

/// Flood `image` from `markers` (nonzero = seed label) inside `mask`.
///
/// Voxels outside the mask, and voxels the flood never reaches, stay 0.
/// Markers lying outside the mask are ignored.
pub fn watershed(image: &Array3<f64>, markers: &Array3<i32>, mask: &Array3<bool>) -> Array3<i32> {
    let shape = image.dim();
    let mut output = Array3::<i32>::zeros(shape);
    let mut heap = BinaryHeap::new();
    let mut age = 0u64;

    for ((x, y, z), &label) in markers.indexed_iter() {
        if label != 0 && mask[[x, y, z]] {
            output[[x, y, z]] = label;
            heap.push(Front {
                value: image[[x, y, z]],
                age,
                index: [x, y, z],
            });
            age += 1;
        }
    }

    let bounds = [shape.0 as i64, shape.1 as i64, shape.2 as i64];
    while let Some(front) = heap.pop() {
        let label = output[front.index];
        for step in NEIGHBOURS.iter() {
            let q = [
                front.index[0] as i64 + step[0],
                front.index[1] as i64 + step[1],
                front.index[2] as i64 + step[2],
            ];
            if (0..3).any(|a| q[a] < 0 || q[a] >= bounds[a]) {
                continue;
            }
            let q = [q[0] as usize, q[1] as usize, q[2] as usize];
            if !mask[q] || output[q] != 0 {
                continue;
            }
            output[q] = label;
            heap.push(Front {
                value: image[q],
                age,
                index: q,
            });
            age += 1;
        }
    }

    output
}
