//! Translating output requests into input requests.
//!
//! For one stage, the [`RegionNegotiator`] takes what each demanded
//! output was asked for, runs it through the stage's padding function
//! and clamps the result to what each producer can supply. Requests from
//! several outputs of the same stage merge by union.

use crate::stage::Stage;
use tessera_core::{ParamSet, Region, RegionError};

/// A request placed on one output of a stage.
#[derive(Clone, Copy, Debug)]
pub struct Demand<'r> {
    /// Output slot index. For sinks, a virtual output 0.
    pub output: usize,
    /// The region asked for.
    pub requested: &'r Region,
    /// The output's largest possible region.
    pub largest: &'r Region,
}

/// Computes input requests for a stage.
///
/// Stateless; exists to name the operation at the seam between the
/// engine's region pass and the stage's padding function.
#[derive(Clone, Copy, Debug, Default)]
pub struct RegionNegotiator;

impl RegionNegotiator {
    /// Region each input must supply so that every demand can be met.
    ///
    /// `input_largest[i]` is the largest possible region of the output
    /// connected to input `i`. The returned vector has the same length.
    ///
    /// For each demand:
    /// 1. the request is cropped to the output's largest possible region;
    /// 2. the stage's padding function maps it onto every input;
    /// 3. the padded region is clamped to that input's largest possible
    ///    region (a halo running off the data edge is not an error);
    /// 4. per-input results are merged by union with earlier demands.
    ///
    /// An input no demand reaches gets an empty region.
    ///
    /// # Errors
    ///
    /// - [`RegionError::EmptyRequest`] if a request does not overlap its
    ///   output's largest possible region, unless both are empty.
    /// - [`RegionError::DimensionMismatch`] if the padding function returns
    ///   a region whose dimensionality differs from the input's.
    pub fn compute_input_regions(
        stage: &dyn Stage,
        params: &ParamSet,
        demands: &[Demand<'_>],
        input_largest: &[Region],
    ) -> Result<Vec<Region>, RegionError> {
        let mut needed: Vec<Region> = input_largest
            .iter()
            .map(|largest| Region::empty_at(largest.origin()))
            .collect();

        for demand in demands {
            let cropped = demand.requested.crop_to(demand.largest)?;
            if cropped.is_empty() {
                if demand.requested == demand.largest {
                    continue;
                }
                return Err(RegionError::EmptyRequest {
                    requested: demand.requested.clone(),
                    available: demand.largest.clone(),
                });
            }
            for (slot, largest) in input_largest.iter().enumerate() {
                let padded = stage.input_region(slot, demand.output, &cropped, params);
                if padded.dims() != largest.dims() {
                    return Err(RegionError::DimensionMismatch {
                        expected: largest.dims(),
                        got: padded.dims(),
                    });
                }
                let clamped = padded.crop_to(largest)?;
                needed[slot] = needed[slot].union(&clamped)?;
            }
        }
        Ok(needed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecuteContext;
    use crate::stage::{InputSlot, OutputSlot};
    use proptest::prelude::*;
    use tessera_core::ProcessingError;

    /// Pads every request by `radius` on input 0 and passes it through to
    /// input 1 unchanged.
    struct Halo {
        radius: u64,
    }

    impl Stage for Halo {
        fn name(&self) -> &str {
            "halo"
        }
        fn inputs(&self) -> Vec<InputSlot> {
            vec![InputSlot::new("padded"), InputSlot::new("plain")]
        }
        fn outputs(&self) -> Vec<OutputSlot> {
            vec![OutputSlot::scalar("a"), OutputSlot::scalar("b")]
        }
        fn input_region(
            &self,
            input: usize,
            _output: usize,
            requested: &Region,
            _params: &ParamSet,
        ) -> Region {
            if input == 0 {
                requested.dilate_uniform(self.radius)
            } else {
                requested.clone()
            }
        }
        fn execute(&self, _ctx: &mut ExecuteContext<'_>) -> Result<(), ProcessingError> {
            Ok(())
        }
    }

    struct Flatten;

    impl Stage for Flatten {
        fn name(&self) -> &str {
            "flatten"
        }
        fn inputs(&self) -> Vec<InputSlot> {
            vec![InputSlot::new("in")]
        }
        fn outputs(&self) -> Vec<OutputSlot> {
            vec![OutputSlot::scalar("out")]
        }
        fn input_region(&self, _: usize, _: usize, requested: &Region, _: &ParamSet) -> Region {
            Region::from_extent(&[requested.cell_count()])
        }
        fn execute(&self, _ctx: &mut ExecuteContext<'_>) -> Result<(), ProcessingError> {
            Ok(())
        }
    }

    fn r(origin: &[i64], extent: &[u64]) -> Region {
        Region::new(origin, extent).unwrap()
    }

    fn negotiate(stage: &dyn Stage, demands: &[Demand<'_>], inputs: &[Region]) -> Vec<Region> {
        RegionNegotiator::compute_input_regions(stage, &ParamSet::new(), demands, inputs).unwrap()
    }

    #[test]
    fn halo_is_added_then_clamped_at_edges() {
        let largest = Region::from_extent(&[128, 128]);
        let requested = r(&[0, 0], &[64, 128]);
        let regions = negotiate(
            &Halo { radius: 1 },
            &[Demand {
                output: 0,
                requested: &requested,
                largest: &largest,
            }],
            &[largest.clone(), largest.clone()],
        );
        assert_eq!(regions[0], r(&[0, 0], &[65, 128]));
        assert_eq!(regions[1], requested);
    }

    #[test]
    fn interior_request_gets_full_halo() {
        let largest = Region::from_extent(&[100, 100]);
        let requested = r(&[40, 40], &[10, 10]);
        let regions = negotiate(
            &Halo { radius: 2 },
            &[Demand {
                output: 0,
                requested: &requested,
                largest: &largest,
            }],
            &[largest.clone(), largest.clone()],
        );
        assert_eq!(regions[0], r(&[38, 38], &[14, 14]));
    }

    #[test]
    fn request_is_cropped_to_largest_first() {
        let largest = Region::from_extent(&[10, 10]);
        let requested = r(&[5, 5], &[20, 20]);
        let regions = negotiate(
            &Halo { radius: 0 },
            &[Demand {
                output: 0,
                requested: &requested,
                largest: &largest,
            }],
            &[largest.clone(), largest.clone()],
        );
        assert_eq!(regions[1], r(&[5, 5], &[5, 5]));
    }

    #[test]
    fn demands_from_two_outputs_merge_by_union() {
        let largest = Region::from_extent(&[10, 10]);
        let a = r(&[0, 0], &[2, 2]);
        let b = r(&[6, 6], &[2, 2]);
        let regions = negotiate(
            &Halo { radius: 0 },
            &[
                Demand {
                    output: 0,
                    requested: &a,
                    largest: &largest,
                },
                Demand {
                    output: 1,
                    requested: &b,
                    largest: &largest,
                },
            ],
            &[largest.clone(), largest.clone()],
        );
        assert_eq!(regions[0], r(&[0, 0], &[8, 8]));
        assert_eq!(regions[1], r(&[0, 0], &[8, 8]));
    }

    #[test]
    fn no_demands_means_empty_input_requests() {
        let largest = Region::from_extent(&[4, 4]);
        let regions = negotiate(&Halo { radius: 1 }, &[], &[largest.clone(), largest]);
        assert!(regions.iter().all(Region::is_empty));
    }

    #[test]
    fn disjoint_request_is_an_error() {
        let largest = Region::from_extent(&[10, 10]);
        let requested = r(&[20, 20], &[5, 5]);
        let err = RegionNegotiator::compute_input_regions(
            &Halo { radius: 1 },
            &ParamSet::new(),
            &[Demand {
                output: 0,
                requested: &requested,
                largest: &largest,
            }],
            &[largest.clone(), largest.clone()],
        )
        .unwrap_err();
        assert!(matches!(err, RegionError::EmptyRequest { .. }));
    }

    #[test]
    fn empty_largest_requested_whole_is_a_no_op() {
        let empty = Region::empty(2);
        let input = Region::from_extent(&[4, 4]);
        let regions = negotiate(
            &Halo { radius: 1 },
            &[Demand {
                output: 0,
                requested: &empty,
                largest: &empty,
            }],
            &[input.clone(), input],
        );
        assert!(regions[0].is_empty());
    }

    #[test]
    fn padding_that_changes_dimensionality_is_rejected() {
        let largest = Region::from_extent(&[4, 4]);
        let err = RegionNegotiator::compute_input_regions(
            &Flatten,
            &ParamSet::new(),
            &[Demand {
                output: 0,
                requested: &largest,
                largest: &largest,
            }],
            &[largest.clone()],
        )
        .unwrap_err();
        assert_eq!(
            err,
            RegionError::DimensionMismatch {
                expected: 2,
                got: 1
            }
        );
    }

    proptest! {
        #[test]
        fn input_requests_stay_within_input_largest(
            x in -20i64..40, y in -20i64..40,
            w in 1u64..30, h in 1u64..30,
            radius in 0u64..5,
        ) {
            let largest = Region::from_extent(&[32, 32]);
            let requested = Region::new(&[x, y], &[w, h]).unwrap();
            let demand = Demand { output: 0, requested: &requested, largest: &largest };
            let result = RegionNegotiator::compute_input_regions(
                &Halo { radius },
                &ParamSet::new(),
                &[demand],
                &[largest.clone(), largest.clone()],
            );
            match result {
                Ok(regions) => {
                    for region in &regions {
                        prop_assert!(largest.contains(region));
                    }
                    let cropped = requested.crop_to(&largest).unwrap();
                    prop_assert!(regions[0].contains(&cropped));
                }
                Err(e) => {
                    let is_empty_request = matches!(e, RegionError::EmptyRequest { .. });
                    prop_assert!(is_empty_request);
                    prop_assert!(requested.crop_to(&largest).unwrap().is_empty());
                }
            }
        }
    }
}
