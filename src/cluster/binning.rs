//! Deterministic bin heuristics used as a last resort by the refiner
//!
//! Neither heuristic looks at similarity; they only group by size.

use std::cmp::Reverse;

/// Pack elements into bins whose total size is at most `max_bin_size`
///
/// Elements are placed largest first into the first bin they fit in (first-fit
/// decreasing). If `min_bin_size` is given, any bin still below it is then folded into the
/// smallest other bin, so that only a lone bin may stay below the minimum.
///
/// Returns the bin index of each element; bins are numbered densely from zero.
pub fn bin_pack(element_sizes: &[u64], max_bin_size: u64, min_bin_size: Option<u64>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..element_sizes.len()).collect();
    order.sort_by_key(|&element| Reverse(element_sizes[element]));

    let mut bin_of_elements = vec![0usize; element_sizes.len()];
    let mut size_of_bins: Vec<u64> = Vec::new();

    for element in order {
        let size = element_sizes[element];
        match size_of_bins.iter().position(|&bin_size| bin_size + size <= max_bin_size) {
            Some(bin) => {
                bin_of_elements[element] = bin;
                size_of_bins[bin] += size;
            }
            None => {
                bin_of_elements[element] = size_of_bins.len();
                size_of_bins.push(size);
            }
        }
    }

    if let Some(min_bin_size) = min_bin_size {
        fold_small_bins(&mut bin_of_elements, &mut size_of_bins, min_bin_size);
    }

    bin_of_elements
}

/// Fold bins below `min_bin_size` into the smallest other bin until none remain
fn fold_small_bins(bin_of_elements: &mut [usize], size_of_bins: &mut Vec<u64>, min_bin_size: u64) {
    while size_of_bins.len() > 1 {
        let (smallest, &smallest_size) = match size_of_bins.iter()
            .enumerate()
            .min_by_key(|&(bin, &size)| (size, bin))
        {
            Some(found) => found,
            None => return,
        };
        if smallest_size >= min_bin_size {
            return;
        }

        let (into, _) = match size_of_bins.iter()
            .enumerate()
            .filter(|&(bin, _)| bin != smallest)
            .min_by_key(|&(bin, &size)| (size, bin))
        {
            Some(found) => found,
            None => return,
        };

        size_of_bins[into] += smallest_size;
        size_of_bins.remove(smallest);
        for bin in bin_of_elements.iter_mut() {
            if *bin == smallest {
                *bin = into;
            }
            if *bin > smallest {
                *bin -= 1;
            }
        }
    }
}

/// Fill bins so that each holds at least `min_bin_size` in total
///
/// Elements are taken smallest first and accumulated into the current bin until it reaches
/// the minimum. A trailing bin that falls short is merged into the previous one.
///
/// Returns the bin index of each element; bins are numbered densely from zero.
pub fn bin_fill(element_sizes: &[usize], min_bin_size: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..element_sizes.len()).collect();
    order.sort_by_key(|&element| element_sizes[element]);

    let mut bin_of_elements = vec![0usize; element_sizes.len()];
    let mut bins_count = 0;
    let mut current_size = 0;
    let mut current_elements: Vec<usize> = Vec::new();

    for element in order {
        current_elements.push(element);
        current_size += element_sizes[element];
        if current_size >= min_bin_size {
            for &member in &current_elements {
                bin_of_elements[member] = bins_count;
            }
            bins_count += 1;
            current_size = 0;
            current_elements.clear();
        }
    }

    if !current_elements.is_empty() {
        let bin = bins_count.saturating_sub(1);
        for member in current_elements {
            bin_of_elements[member] = bin;
        }
    }

    bin_of_elements
}
