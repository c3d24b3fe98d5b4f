/*
 *  File: leakage.rs
 *  Author: Prasanna Paithankar (21CS30065)
 *  Date: 20/04/2025
 *
 *  Course: Hardware Security (CS60004) Spring 2025
 *  Assignment 2: AES Leakage and DPA/CPA Key Recovery
 *
 *  Refer to the README.md for other details.
 */

//! Leakage models: Hamming weight, Hamming distance and single-bit selection.

use std::ops::BitXor;

use ndarray::{Array, Array1, ArrayView, ArrayView2, Axis, Dimension, RemoveAxis};

use crate::{Error, Result};

pub trait HammingWeight: Copy {
    /// Number of set bits, counted one bit at a time.
    fn hamming(self) -> u32;
}

macro_rules! impl_hamming_weight {
    ($($t:ty),*) => {
        $(
            impl HammingWeight for $t {
                fn hamming(self) -> u32 {
                    let mut value = self;
                    let mut weight = 0;
                    while value != 0 {
                        weight += (value & 1) as u32;
                        value >>= 1;
                    }
                    weight
                }
            }
        )*
    };
}

impl_hamming_weight!(u8, u16, u32, u64);

pub fn hamming_weight<T: HammingWeight>(value: T) -> u32 {
    value.hamming()
}

pub fn hamming_distance<T>(a: T, b: T) -> u32
where
    T: HammingWeight + BitXor<Output = T>,
{
    (a ^ b).hamming()
}

/// `(value >> k) & 1`
#[inline]
pub fn bit(value: u8, k: u8) -> u8 {
    (value >> k) & 1
}

/// Element-wise Hamming weight; keeps the input shape.
pub fn hamming_weight_array<T, D>(data: ArrayView<T, D>) -> Array<u32, D>
where
    T: HammingWeight,
    D: Dimension,
{
    data.mapv(HammingWeight::hamming)
}

/// Sum of the weights of each row, i.e. reduced along the last axis.
pub fn hamming_weight_rows<T: HammingWeight>(data: ArrayView2<T>) -> Array1<u32> {
    data.map_axis(Axis(1), |row| row.iter().map(|v| v.hamming()).sum())
}

/// Total weight of each entry along the leading axis, summing every other
/// axis: a `41 x D x 16` state tensor gives one value per state.
pub fn hamming_weight_leading<T, D>(data: ArrayView<T, D>) -> Array1<u32>
where
    T: HammingWeight,
    D: RemoveAxis,
{
    data.outer_iter().map(hamming_weight_total).collect()
}

pub fn hamming_weight_total<T: HammingWeight, D: Dimension>(data: ArrayView<T, D>) -> u32 {
    data.iter().map(|v| v.hamming()).sum()
}

/// Row-wise bit distance between two equally shaped batches.
pub fn hamming_distance_rows<T>(a: ArrayView2<T>, b: ArrayView2<T>) -> Result<Array1<u32>>
where
    T: HammingWeight + BitXor<Output = T>,
{
    if a.nrows() != b.nrows() {
        return Err(Error::Shape {
            context: "hamming distance row count",
            expected: a.nrows(),
            actual: b.nrows(),
        });
    }
    if a.ncols() != b.ncols() {
        return Err(Error::Shape {
            context: "hamming distance row width",
            expected: a.ncols(),
            actual: b.ncols(),
        });
    }

    let mut distance = Array1::zeros(a.nrows());
    for ((slot, row_a), row_b) in distance.iter_mut().zip(a.rows()).zip(b.rows()) {
        *slot = row_a
            .iter()
            .zip(row_b.iter())
            .map(|(&x, &y)| hamming_distance(x, y))
            .sum();
    }

    Ok(distance)
}

/// Maps a hypothetical intermediate byte to a predicted leakage value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeakageModel {
    HammingWeight,
    /// Selects one bit of the value; 0 is the least significant.
    Bit(u8),
}

impl LeakageModel {
    #[inline]
    pub fn predict(self, value: u8) -> u8 {
        match self {
            LeakageModel::HammingWeight => hamming_weight(value) as u8,
            LeakageModel::Bit(k) => bit(value, k),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2, Array3};

    #[test]
    fn weight_of_extremes() {
        assert_eq!(hamming_weight(0xFFu8), 8);
        assert_eq!(hamming_weight(0x00u8), 0);
        assert_eq!(hamming_weight(0x8001u16), 2);
        assert_eq!(hamming_weight(u64::MAX), 64);
    }

    #[test]
    fn weight_agrees_with_count_ones() {
        for v in 0u8..=255 {
            assert_eq!(hamming_weight(v), v.count_ones());
            assert_eq!(hamming_distance(v, v), 0);
        }
    }

    #[test]
    fn distance_of_lab_plaintexts() {
        // '6' vs '7' differ in one bit
        let a = Array2::from_shape_vec((1, 16), b"Attack at 12:56!".to_vec()).unwrap();
        let b = Array2::from_shape_vec((1, 16), b"Attack at 12:57!".to_vec()).unwrap();
        assert_eq!(hamming_distance_rows(a.view(), b.view()).unwrap(), array![1]);
    }

    #[test]
    fn distance_rows_need_equal_shapes() {
        let a = Array2::<u8>::zeros((2, 16));
        let b = Array2::<u8>::zeros((3, 16));
        assert!(matches!(
            hamming_distance_rows(a.view(), b.view()),
            Err(Error::Shape { expected: 2, actual: 3, .. })
        ));

        let narrow = Array2::<u8>::zeros((2, 8));
        assert!(matches!(
            hamming_distance_rows(a.view(), narrow.view()),
            Err(Error::Shape { expected: 16, actual: 8, .. })
        ));
    }

    #[test]
    fn leading_axis_weights() {
        let mut states = Array3::<u8>::zeros((41, 2, 16));
        states[[0, 0, 0]] = 0xFF;
        states[[0, 1, 15]] = 0x01;
        states[[40, 1, 3]] = 0x0F;
        let weights = hamming_weight_leading(states.view());
        assert_eq!(weights.len(), 41);
        assert_eq!(weights[0], 9);
        assert_eq!(weights[40], 4);
        assert_eq!(weights.sum(), hamming_weight_total(states.view()));

        let rows = array![[0x0Fu8, 0xF0, 0x01], [0xFF, 0x00, 0x80]];
        assert_eq!(hamming_weight_leading(rows.view()), hamming_weight_rows(rows.view()));
        assert_eq!(hamming_weight_leading(array![0x03u8, 0x80].view()), array![2, 1]);
    }

    #[test]
    fn scalar_and_batched_agree() {
        let data = array![[0x0Fu8, 0xF0, 0x01], [0xFF, 0x00, 0x80]];
        let weights = hamming_weight_array(data.view());
        for (w, v) in weights.iter().zip(data.iter()) {
            assert_eq!(*w, hamming_weight(*v));
        }
        assert_eq!(hamming_weight_rows(data.view()), array![9, 9]);
        assert_eq!(hamming_weight_total(data.view()), 18);

        let cube = Array3::<u8>::from_elem((2, 3, 4), 0x03);
        assert_eq!(hamming_weight_total(cube.view()), 48);
    }

    #[test]
    fn bit_selection() {
        assert_eq!(bit(0b1010_0001, 0), 1);
        assert_eq!(bit(0b1010_0001, 1), 0);
        assert_eq!(bit(0b1010_0001, 7), 1);
        assert_eq!(LeakageModel::Bit(5).predict(0b0010_0000), 1);
        assert_eq!(LeakageModel::HammingWeight.predict(0x63), 4);
    }
}
